//! UsageLedger: idempotent usage events plus a best-effort per-user summary.
//!
//! The event document is the source of truth; its deterministic id makes a
//! resubmission collide instead of counting twice. The summary is derived
//! from accepted events and may fall behind if its write fails; it is never
//! updated for an event that was not created.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use chatrelay_types::error::LedgerError;
use chatrelay_types::usage::{UsageEvent, UsageSubmission, UsageSummary};

use crate::ledger::{DocumentQuery, LazyLedger, LedgerContainer};

/// How a submitted event was handled. All three are success for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    /// Event stored and summary updated.
    Recorded,
    /// An event with the same key already existed; nothing changed.
    Duplicate,
    /// Event stored, but the summary update failed and now lags behind.
    SummaryLagging,
}

pub struct UsageLedger {
    ledger: Arc<LazyLedger>,
    /// Serializes read-modify-write of each user's summary within this
    /// process. An entry lives only while some update for that user is in
    /// flight.
    summary_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UsageLedger {
    pub fn new(ledger: Arc<LazyLedger>) -> Self {
        Self {
            ledger,
            summary_locks: DashMap::new(),
        }
    }

    /// Build the event for `user_id` and record it.
    pub async fn record_submission(
        &self,
        user_id: &str,
        submission: UsageSubmission,
    ) -> Result<UsageOutcome, LedgerError> {
        let event = UsageEvent::from_submission(user_id, submission, Utc::now());
        self.record_event(&event).await
    }

    /// Record one event.
    ///
    /// Returns `Err` only when the event itself could not be stored; in that
    /// case the summary is untouched.
    pub async fn record_event(&self, event: &UsageEvent) -> Result<UsageOutcome, LedgerError> {
        let container = self.ledger.container().await?;

        info!(
            event_id = %event.id,
            conversation_id = %event.conversation_id,
            assistant_message_index = event.assistant_message_index,
            model_id = event.model_id.as_deref().unwrap_or("-"),
            priced = event.priced,
            input_tokens = event.input_tokens,
            output_tokens = event.output_tokens,
            total_cost_usd = event.total_cost_usd,
            "recording usage event"
        );

        let doc = serde_json::to_value(event).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        match container.create(&doc).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                info!(event_id = %event.id, "usage event already recorded, summary left as is");
                return Ok(UsageOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        match self.update_summary(container.as_ref(), event).await {
            Ok(()) => Ok(UsageOutcome::Recorded),
            Err(e) => {
                warn!(
                    summary_id = %UsageSummary::key(&event.user_id),
                    event_id = %event.id,
                    error = %e,
                    "failed to upsert usage summary"
                );
                Ok(UsageOutcome::SummaryLagging)
            }
        }
    }

    async fn update_summary<C: LedgerContainer>(
        &self,
        container: &C,
        event: &UsageEvent,
    ) -> Result<(), LedgerError> {
        let lock = self
            .summary_locks
            .entry(event.user_id.clone())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            merge_and_upsert(container, event).await
        };

        // The map and this clone are the only holders when nobody else waits.
        self.summary_locks
            .remove_if(&event.user_id, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
        result
    }
}

async fn merge_and_upsert<C: LedgerContainer>(container: &C, event: &UsageEvent) -> Result<(), LedgerError> {
    let query = DocumentQuery::of_type(UsageSummary::DOC_TYPE)
        .filter_eq("id", UsageSummary::key(&event.user_id))
        .filter_eq("userId", event.user_id.clone())
        .limit(1);
    let existing = container.query(&query).await?.into_iter().next();

    let next = merge_summary(existing, event, Utc::now())?;
    container.upsert(&next).await
}

/// The next summary document: `existing` (or zero) plus the event's deltas.
///
/// Reads the existing document leniently (missing counters count as zero)
/// and keeps any fields it carries that the summary type does not know.
fn merge_summary(
    existing: Option<Value>,
    event: &UsageEvent,
    now: DateTime<Utc>,
) -> Result<Value, LedgerError> {
    let mut fields = match existing {
        Some(Value::Object(fields)) => fields,
        _ => Map::new(),
    };

    let count = |name: &str| fields.get(name).and_then(Value::as_u64).unwrap_or(0);
    let current = UsageSummary {
        total_cost_usd: fields.get("totalCostUSD").and_then(Value::as_f64).unwrap_or(0.0),
        total_input_tokens: count("totalInputTokens"),
        total_output_tokens: count("totalOutputTokens"),
        total_assistant_messages: count("totalAssistantMessages"),
        created_at: fields
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or(now, |t| t.with_timezone(&Utc)),
        ..UsageSummary::empty(&event.user_id, now)
    };

    let next = serde_json::to_value(current.with_event(event, now))
        .map_err(|e| LedgerError::Serialization(e.to_string()))?;
    if let Value::Object(computed) = next {
        fields.extend(computed);
    }
    Ok(Value::Object(fields))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ledger::memory::{InMemoryContainer, InMemoryLedger};
    use crate::ledger::{Document, Ledger};

    /// Ledger whose containers can be told to fail specific operations.
    #[derive(Clone)]
    struct FlakyLedger {
        inner: InMemoryLedger,
        fail_create: bool,
        fail_upsert: bool,
    }

    struct FlakyContainer {
        inner: InMemoryContainer,
        fail_create: bool,
        fail_upsert: bool,
    }

    impl Ledger for FlakyLedger {
        type Container = FlakyContainer;

        async fn open_container(&self, db: &str, c: &str) -> Result<FlakyContainer, LedgerError> {
            Ok(FlakyContainer {
                inner: self.inner.open_container(db, c).await?,
                fail_create: self.fail_create,
                fail_upsert: self.fail_upsert,
            })
        }
    }

    impl LedgerContainer for FlakyContainer {
        async fn create(&self, doc: &Document) -> Result<(), LedgerError> {
            if self.fail_create {
                return Err(LedgerError::Unavailable("throttled".to_string()));
            }
            self.inner.create(doc).await
        }

        async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, LedgerError> {
            self.inner.query(query).await
        }

        async fn upsert(&self, doc: &Document) -> Result<(), LedgerError> {
            if self.fail_upsert {
                return Err(LedgerError::Unavailable("throttled".to_string()));
            }
            self.inner.upsert(doc).await
        }
    }

    struct Fixture {
        usage: Arc<UsageLedger>,
        store: InMemoryContainer,
    }

    async fn fixture_with(fail_create: bool, fail_upsert: bool) -> Fixture {
        let inner = InMemoryLedger::new();
        let store = inner.open_container("db", "Chatbot").await.unwrap();
        let ledger = FlakyLedger {
            inner,
            fail_create,
            fail_upsert,
        };
        Fixture {
            usage: Arc::new(UsageLedger::new(Arc::new(LazyLedger::new(ledger, "db", "Chatbot")))),
            store,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(false, false).await
    }

    fn submission(conversation: &str, index: u64, input: u64, output: u64, cost: f64) -> UsageSubmission {
        UsageSubmission {
            conversation_id: conversation.to_string(),
            assistant_message_index: index,
            model_id: Some("gpt-4".to_string()),
            pricing_model_id: None,
            priced: true,
            input_tokens: input,
            output_tokens: output,
            total_cost_usd: cost,
        }
    }

    fn summary(store: &InMemoryContainer, user: &str) -> Value {
        store.get(&UsageSummary::key(user)).expect("summary missing")
    }

    #[tokio::test]
    async fn test_first_event_creates_event_and_summary() {
        let f = fixture().await;
        let outcome = f.usage.record_submission("u1", submission("c1", 0, 100, 50, 0.25)).await.unwrap();
        assert_eq!(outcome, UsageOutcome::Recorded);

        let event = f.store.get("usageEvent|u1|c1|0").unwrap();
        assert_eq!(event["type"], "usageEvent");
        assert_eq!(event["inputTokens"], 100);

        let s = summary(&f.store, "u1");
        assert_eq!(s["type"], "usageSummary");
        assert_eq!(s["userId"], "u1");
        assert_eq!(s["totalInputTokens"], 100);
        assert_eq!(s["totalOutputTokens"], 50);
        assert_eq!(s["totalAssistantMessages"], 1);
        assert_eq!(s["totalCostUSD"], 0.25);
        assert_eq!(s["createdAt"], s["updatedAt"]);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_not_double_counted() {
        let f = fixture().await;
        let first = f.usage.record_submission("u1", submission("c1", 3, 10, 20, 0.5)).await.unwrap();
        let again = f.usage.record_submission("u1", submission("c1", 3, 999, 999, 9.0)).await.unwrap();
        assert_eq!(first, UsageOutcome::Recorded);
        assert_eq!(again, UsageOutcome::Duplicate);

        let s = summary(&f.store, "u1");
        assert_eq!(s["totalInputTokens"], 10);
        assert_eq!(s["totalAssistantMessages"], 1);
        assert_eq!(f.store.get("usageEvent|u1|c1|3").unwrap()["inputTokens"], 10);
    }

    #[tokio::test]
    async fn test_summary_accumulates_across_conversations() {
        let f = fixture().await;
        f.usage.record_submission("u1", submission("c1", 0, 1, 2, 0.5)).await.unwrap();
        f.usage.record_submission("u1", submission("c1", 1, 3, 4, 0.25)).await.unwrap();
        f.usage.record_submission("u1", submission("c2", 0, 5, 6, 1.0)).await.unwrap();
        f.usage.record_submission("u2", submission("c1", 0, 7, 8, 2.0)).await.unwrap();

        let s = summary(&f.store, "u1");
        assert_eq!(s["totalInputTokens"], 9);
        assert_eq!(s["totalOutputTokens"], 12);
        assert_eq!(s["totalAssistantMessages"], 3);
        assert_eq!(s["totalCostUSD"], 1.75);
        assert_eq!(summary(&f.store, "u2")["totalAssistantMessages"], 1);
    }

    #[tokio::test]
    async fn test_existing_summary_fields_are_preserved() {
        let f = fixture().await;
        f.store
            .upsert(&json!({
                "id": "usageSummary|u1",
                "type": "usageSummary",
                "userId": "u1",
                "totalCostUSD": 1.0,
                "totalInputTokens": 10,
                "createdAt": "2025-01-01T00:00:00Z",
                "team": "finance"
            }))
            .await
            .unwrap();

        f.usage.record_submission("u1", submission("c1", 0, 5, 5, 0.5)).await.unwrap();

        let s = summary(&f.store, "u1");
        assert_eq!(s["team"], "finance");
        assert_eq!(s["totalInputTokens"], 15);
        // missing counters start from zero
        assert_eq!(s["totalOutputTokens"], 5);
        assert_eq!(s["totalAssistantMessages"], 1);
        assert_eq!(s["totalCostUSD"], 1.5);
        assert_eq!(s["createdAt"], "2025-01-01T00:00:00Z");
        assert_ne!(s["updatedAt"], s["createdAt"]);
    }

    #[tokio::test]
    async fn test_event_create_failure_skips_summary() {
        let f = fixture_with(true, false).await;
        let result = f.usage.record_submission("u1", submission("c1", 0, 1, 1, 0.1)).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_summary_failure_keeps_event() {
        let f = fixture_with(false, true).await;
        let outcome = f.usage.record_submission("u1", submission("c1", 0, 1, 1, 0.1)).await.unwrap();
        assert_eq!(outcome, UsageOutcome::SummaryLagging);
        assert!(f.store.get("usageEvent|u1|c1|0").is_some());
        assert!(f.store.get("usageSummary|u1").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_events_for_one_user_all_counted() {
        let f = fixture().await;
        let mut handles = Vec::new();
        for i in 0..25u64 {
            let usage = f.usage.clone();
            handles.push(tokio::spawn(async move {
                usage.record_submission("u1", submission("c1", i, 2, 3, 0.5)).await
            }));
        }
        // same keys again, racing the originals
        for i in 0..25u64 {
            let usage = f.usage.clone();
            handles.push(tokio::spawn(async move {
                usage.record_submission("u1", submission("c1", i, 2, 3, 0.5)).await
            }));
        }

        let mut recorded = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == UsageOutcome::Recorded {
                recorded += 1;
            }
        }
        assert_eq!(recorded, 25);

        let s = summary(&f.store, "u1");
        assert_eq!(s["totalAssistantMessages"], 25);
        assert_eq!(s["totalInputTokens"], 50);
        assert_eq!(s["totalOutputTokens"], 75);
        assert_eq!(s["totalCostUSD"], 12.5);
        assert!(f.usage.summary_locks.is_empty());
    }

    #[tokio::test]
    async fn test_summary_locks_released_after_update() {
        let f = fixture().await;
        for user in ["u1", "u2", "u3"] {
            f.usage.record_submission(user, submission("c1", 0, 1, 1, 0.1)).await.unwrap();
        }
        assert!(f.usage.summary_locks.is_empty());

        let f = fixture_with(false, true).await;
        f.usage.record_submission("u1", submission("c1", 0, 1, 1, 0.1)).await.unwrap();
        assert!(f.usage.summary_locks.is_empty());
    }

    #[test]
    fn test_merge_summary_from_scratch() {
        let event = UsageEvent::from_submission("u9", submission("c", 0, 4, 6, 0.125), Utc::now());
        let now = Utc::now();
        let doc = merge_summary(None, &event, now).unwrap();
        assert_eq!(doc["id"], "usageSummary|u9");
        assert_eq!(doc["totalAssistantMessages"], 1);
        assert_eq!(doc["totalCostUSD"], 0.125);
    }
}
