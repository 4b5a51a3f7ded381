//! Read-only views for the admin dashboard.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use chatrelay_types::chat::DashboardChatItem;
use chatrelay_types::error::LedgerError;
use chatrelay_types::usage::{UsageEvent, UsageOverview, UsageSummary};

use crate::ledger::{DocumentQuery, LazyLedger, LedgerContainer, SortOrder, TIMESTAMP_FIELD};

pub const RECENT_CHATS_LIMIT: usize = 100;
pub const USAGE_ROWS_LIMIT: usize = 200;
pub const ANSWER_SNIPPET_CHARS: usize = 500;

pub struct DashboardService {
    ledger: Arc<LazyLedger>,
}

impl DashboardService {
    pub fn new(ledger: Arc<LazyLedger>) -> Self {
        Self { ledger }
    }

    /// The most recent chat exchanges, newest first.
    ///
    /// Any document carrying a `questionAnswerTuple` counts as a chat record,
    /// including ones written before records had a `type` or `createdAt`.
    pub async fn recent_chats(&self) -> Result<Vec<DashboardChatItem>, LedgerError> {
        let container = self.ledger.container().await?;
        let query = DocumentQuery::all()
            .where_present("questionAnswerTuple")
            .order_by(TIMESTAMP_FIELD, SortOrder::Desc)
            .limit(RECENT_CHATS_LIMIT)
            .select(["id", "questionAnswerTuple", "createdAt", TIMESTAMP_FIELD]);

        let docs = container.query(&query).await?;
        Ok(docs.iter().filter_map(chat_item).collect())
    }

    /// Top spenders and the latest events.
    pub async fn usage_overview(&self) -> Result<UsageOverview, LedgerError> {
        let container = self.ledger.container().await?;
        let summaries_query = DocumentQuery::of_type(UsageSummary::DOC_TYPE)
            .order_by("totalCostUSD", SortOrder::Desc)
            .limit(USAGE_ROWS_LIMIT);
        let events_query = DocumentQuery::of_type(UsageEvent::DOC_TYPE)
            .order_by("createdAt", SortOrder::Desc)
            .limit(USAGE_ROWS_LIMIT);

        let (summaries, events) = tokio::try_join!(
            container.query(&summaries_query),
            container.query(&events_query)
        )?;

        Ok(UsageOverview {
            summaries: parse_all(summaries),
            events: parse_all(events),
        })
    }
}

/// Typed documents, skipping any that do not parse.
fn parse_all<T: DeserializeOwned>(docs: Vec<Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
            serde_json::from_value(doc)
                .map_err(|e| warn!(doc_id = %id, error = %e, "skipping malformed usage document"))
                .ok()
        })
        .collect()
}

fn chat_item(doc: &Value) -> Option<DashboardChatItem> {
    let id = doc.get("id")?.as_str()?;
    let tuple = doc.get("questionAnswerTuple")?.as_array()?;

    let turn = |kind: &str| {
        tuple
            .iter()
            .find(|t| t.pointer("/who/kind").and_then(Value::as_str) == Some(kind))
    };
    let user = turn("user");
    let llm = turn("llm");

    let text = |turn: Option<&Value>, path: &str| {
        turn.and_then(|t| t.pointer(path))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let answer = text(llm, "/message").unwrap_or_default();

    Some(DashboardChatItem {
        id: id.to_string(),
        created_at: created_at(doc),
        user_name: text(user, "/who/info/userName"),
        user_id: text(user, "/who/info/userId"),
        identity_provider: text(user, "/who/info/identityProvider"),
        model_id: text(llm, "/who/info/id"),
        model_name: text(llm, "/who/info/name"),
        question: text(user, "/message").unwrap_or_default(),
        answer_snippet: answer.chars().take(ANSWER_SNIPPET_CHARS).collect(),
    })
}

/// The record's own timestamp, else the store's, else now.
fn created_at(doc: &Value) -> String {
    if let Some(created) = doc.get("createdAt").and_then(Value::as_str) {
        return created.to_string();
    }
    doc.get(TIMESTAMP_FIELD)
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}
