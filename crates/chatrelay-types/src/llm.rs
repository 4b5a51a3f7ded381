//! Conversation and model types exchanged with the completion provider.
//!
//! These types model the request side of a relayed chat: the caller's
//! messages, the selected model's metadata, and the errors a provider
//! or its response stream can produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an LLM conversation. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Metadata for the model the caller selected.
///
/// `token_limit` bounds the history window; the relay has no other model
/// knowledge. The whole struct is recorded as the `llm` participant's info
/// in a chat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub max_length: u32,
    pub token_limit: u32,
}

/// Terminal error carried inside a response byte stream.
///
/// Cloneable so that a single upstream failure can be delivered to every
/// branch of a tee.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream error: {0}")]
pub struct StreamError(pub String);

/// Errors from a completion provider before any byte was produced.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no API key configured for the completion provider")]
    MissingApiKey,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
