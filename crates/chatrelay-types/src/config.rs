//! Relay configuration types.
//!
//! `RelayConfig` represents `chatrelay.toml`. Every section and field has a
//! default so an empty or missing file yields a runnable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// System prompt used when a chat request does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ChatGPT, a large language model trained by OpenAI. \
Follow the user's instructions carefully. Respond using markdown.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Prompt substituted when the caller sends none.
    #[serde(default)]
    pub default_system_prompt: Option<String>,
}

impl RelayConfig {
    pub fn system_prompt_or_default(&self) -> &str {
        self.default_system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which ledger implementation backs chat logs and usage accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,
    /// Directory holding `{database_id}.db`. Resolved to `~/.chatrelay` when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_database_id")]
    pub database_id: String,
    #[serde(default = "default_container_id")]
    pub container_id: String,
}

fn default_database_id() -> String {
    "dev-2025-04-29".to_string()
}

fn default_container_id() -> String {
    "Chatbot".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            data_dir: None,
            database_id: default_database_id(),
            container_id: default_container_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Fallback key when a request carries none. Usually supplied via `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_api_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    1.0
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_key: None,
            organization: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Tokens held back for the model's reply when windowing history.
    #[serde(default = "default_reserve_tokens")]
    pub reserve_tokens: usize,
}

fn default_reserve_tokens() -> usize {
    1000
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            reserve_tokens: default_reserve_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for detached logging tasks before exiting.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_drain_timeout_secs() -> u64 {
    10
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
        assert_eq!(config.ledger.database_id, "dev-2025-04-29");
        assert_eq!(config.ledger.container_id, "Chatbot");
        assert_eq!(config.provider.max_tokens, 1000);
        assert_eq!(config.history.reserve_tokens, 1000);
        assert_eq!(config.system_prompt_or_default(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_relay_config_deserialize_empty() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.shutdown.drain_timeout_secs, 10);
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn test_relay_config_deserialize_with_values() {
        let toml_str = r#"
default_system_prompt = "Be terse."

[server]
port = 8080

[ledger]
backend = "memory"
container_id = "Chats"

[provider]
api_host = "http://localhost:9999"
temperature = 0.2

[history]
reserve_tokens = 500
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert_eq!(config.ledger.container_id, "Chats");
        assert_eq!(config.ledger.database_id, "dev-2025-04-29");
        assert_eq!(config.provider.api_host, "http://localhost:9999");
        assert!((config.provider.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.history.reserve_tokens, 500);
        assert_eq!(config.system_prompt_or_default(), "Be terse.");
    }

    #[test]
    fn test_blank_default_prompt_falls_back() {
        let config = RelayConfig {
            default_system_prompt: Some("   ".to_string()),
            ..RelayConfig::default()
        };
        assert_eq!(config.system_prompt_or_default(), DEFAULT_SYSTEM_PROMPT);
    }
}
