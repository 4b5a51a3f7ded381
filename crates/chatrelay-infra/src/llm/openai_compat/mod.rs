//! OpenAI-compatible completion provider.
//!
//! Streams `POST {api_host}/v1/chat/completions` and forwards the generated
//! text as raw bytes. Any host speaking the OpenAI chat completions protocol
//! (OpenAI, Azure-style proxies, local gateways) works via `api_host`.

pub mod streaming;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use chatrelay_core::llm::provider::{ByteStream, ChatCompletionRequest, CompletionProvider};
use chatrelay_types::config::ProviderConfig;
use chatrelay_types::llm::{MessageRole, ProviderError};

use self::streaming::completion_text_stream;

/// Upper bound on how much of an upstream error body is kept in the error.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

/// Streaming provider for the OpenAI chat completions API.
///
/// # API Key Security
///
/// The fallback key is stored as a [`SecretString`] and only exposed when
/// building the `Authorization` header. The struct does not derive Debug.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    organization: Option<String>,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiCompatProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_host.trim_end_matches('/').to_string(),
            api_key: config
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .map(|k| SecretString::from(k.to_string())),
            organization: config.organization.clone().filter(|o| !o.is_empty()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The caller's key wins; the configured key is the fallback.
    fn resolve_key<'a>(
        &'a self,
        request_key: Option<&'a SecretString>,
    ) -> Result<&'a SecretString, ProviderError> {
        request_key
            .filter(|k| !k.expose_secret().is_empty())
            .or(self.api_key.as_ref())
            .ok_or(ProviderError::MissingApiKey)
    }

    fn wire_request<'a>(&self, request: &'a ChatCompletionRequest) -> WireRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: MessageRole::System,
            content: &request.system_prompt,
        });
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.clone(),
            content: &m.content,
        }));

        WireRequest {
            model: &request.model.id,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        }
    }
}

impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ByteStream, ProviderError> {
        let key = self.resolve_key(request.api_key.as_ref())?;
        let body = self.wire_request(&request);

        let mut builder = self
            .client
            .post(self.url("/v1/chat/completions"))
            .bearer_auth(key.expose_secret())
            .json(&body);
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        tracing::debug!(model = %request.model.id, messages = body.messages.len(), "sending completion request");

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        Ok(completion_text_stream(response.bytes_stream()))
    }
}

/// Prefer the API's own `error.message`, else the raw body, else the status text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string));

    let message = match from_json {
        Some(m) => m,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
