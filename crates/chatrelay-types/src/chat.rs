//! Chat exchange records and the history window sent upstream.
//!
//! A `ChatRecord` is written once per completed exchange and never mutated.
//! Its persisted shape keeps the `questionAnswerTuple` layout that the
//! dashboard and downstream consumers read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Identity;
use crate::llm::{Message, ModelInfo};

/// Who produced one side of an exchange.
///
/// Serializes as `{ "kind": "user" | "llm", "info": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "info", rename_all = "lowercase")]
pub enum Speaker {
    User(Option<Identity>),
    Llm(ModelInfo),
}

/// One side of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTurn {
    pub who: Speaker,
    pub message: String,
}

/// A completed user/model exchange, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "chatRecord", rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Exactly one user turn followed by one model turn.
    pub question_answer_tuple: [ExchangeTurn; 2],
}

impl ChatRecord {
    /// Discriminator stored in the `type` field of chat documents.
    pub const DOC_TYPE: &'static str = "chatRecord";

    /// Build a record with a fresh unique id.
    pub fn new(
        identity: Option<Identity>,
        question: String,
        model: ModelInfo,
        answer: String,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            question_answer_tuple: [
                ExchangeTurn {
                    who: Speaker::User(identity),
                    message: question,
                },
                ExchangeTurn {
                    who: Speaker::Llm(model),
                    message: answer,
                },
            ],
        }
    }

    pub fn question(&self) -> &str {
        &self.question_answer_tuple[0].message
    }

    pub fn answer(&self) -> &str {
        &self.question_answer_tuple[1].message
    }
}

/// Messages selected to fit the model's token budget, plus the system prompt.
///
/// Created per request and discarded once the provider call is made.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationWindow {
    pub system_prompt: String,
    /// Selected messages in chronological order.
    pub messages: Vec<Message>,
    /// Tokens used by `messages` (system prompt and reserve excluded).
    pub message_tokens: usize,
}

/// Row of the admin dashboard's recent-chats table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardChatItem {
    pub id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub question: String,
    pub answer_snippet: String,
}
