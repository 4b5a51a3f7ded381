//! Configuration loader for the relay.
//!
//! Reads `chatrelay.toml` into [`RelayConfig`], then applies environment
//! overrides. Falls back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use chatrelay_types::config::{LedgerBackend, RelayConfig};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "chatrelay.toml";

/// Load configuration from `path`, then apply process environment overrides.
pub async fn load_config(path: &Path) -> RelayConfig {
    let mut config = read_config_file(path).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Parse the TOML file at `path`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
pub async fn read_config_file(path: &Path) -> RelayConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            RelayConfig::default()
        }
    }
}

/// Apply `CHATRELAY_*` and `OPENAI_*` overrides read through `lookup`.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("CHATRELAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("CHATRELAY_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!(value = %port, "ignoring invalid CHATRELAY_PORT"),
        }
    }
    if let Some(dir) = lookup("CHATRELAY_DATA_DIR") {
        config.ledger.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(id) = lookup("CHATRELAY_DATABASE_ID") {
        config.ledger.database_id = id;
    }
    if let Some(id) = lookup("CHATRELAY_CONTAINER_ID") {
        config.ledger.container_id = id;
    }
    if let Some(backend) = lookup("CHATRELAY_LEDGER_BACKEND") {
        match backend.to_lowercase().as_str() {
            "sqlite" => config.ledger.backend = LedgerBackend::Sqlite,
            "memory" => config.ledger.backend = LedgerBackend::Memory,
            _ => tracing::warn!(value = %backend, "ignoring invalid CHATRELAY_LEDGER_BACKEND"),
        }
    }
    if let Some(host) = lookup("OPENAI_API_HOST") {
        config.provider.api_host = host;
    }
    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.provider.api_key = Some(key);
    }
    if let Some(org) = lookup("OPENAI_ORGANIZATION") {
        config.provider.organization = Some(org);
    }
}

/// Directory holding the sqlite ledger files.
///
/// An explicitly configured path is kept as is, even when empty; the ledger
/// treats an empty path as unavailable. Otherwise `~/.chatrelay`.
pub fn resolve_data_dir(config: &RelayConfig) -> PathBuf {
    if let Some(dir) = &config.ledger.data_dir {
        return dir.clone();
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chatrelay");
    }

    // Last resort: current directory
    PathBuf::from(".chatrelay")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(&tmp.path().join(DEFAULT_CONFIG_FILE)).await;
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
    }

    #[tokio::test]
    async fn read_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(
            &path,
            r#"
[server]
port = 4100

[ledger]
backend = "memory"
database_id = "prod"

[shutdown]
drain_timeout_secs = 3
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(&path).await;
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert_eq!(config.ledger.database_id, "prod");
        assert_eq!(config.ledger.container_id, "Chatbot");
        assert_eq!(config.shutdown.drain_timeout_secs, 3);
    }

    #[tokio::test]
    async fn read_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(&path).await;
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.database_id, "dev-2025-04-29");
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("CHATRELAY_PORT", "8081"),
            ("CHATRELAY_DATA_DIR", "/srv/chatrelay"),
            ("CHATRELAY_LEDGER_BACKEND", "Memory"),
            ("CHATRELAY_CONTAINER_ID", "Chats"),
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_API_HOST", "http://gateway:8000"),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.ledger.data_dir, Some(PathBuf::from("/srv/chatrelay")));
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert_eq!(config.ledger.container_id, "Chats");
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.provider.api_host, "http://gateway:8000");
        assert!(config.provider.organization.is_none());
    }

    #[test]
    fn env_overrides_ignore_invalid_values() {
        let mut config = RelayConfig::default();
        apply_env_overrides(&mut config, |k| match k {
            "CHATRELAY_PORT" => Some("not-a-port".to_string()),
            "CHATRELAY_LEDGER_BACKEND" => Some("cosmos".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
    }

    #[test]
    fn resolve_data_dir_keeps_explicit_value() {
        let mut config = RelayConfig::default();
        config.ledger.data_dir = Some(PathBuf::new());
        assert_eq!(resolve_data_dir(&config), PathBuf::new());

        config.ledger.data_dir = None;
        assert!(resolve_data_dir(&config).ends_with(".chatrelay"));
    }
}
