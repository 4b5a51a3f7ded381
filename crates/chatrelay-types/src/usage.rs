//! Usage accounting types.
//!
//! A `UsageEvent` records the token/cost measurement for one assistant
//! message; its id is derived from (user, conversation, message index) so
//! that resubmissions collide instead of double counting. A `UsageSummary`
//! is the running per-user aggregate of accepted events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Caller-supplied usage measurement, validated field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSubmission {
    pub conversation_id: String,
    pub assistant_message_index: u64,
    pub model_id: Option<String>,
    pub pricing_model_id: Option<String>,
    pub priced: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost_usd: f64,
}

impl UsageSubmission {
    /// Validate a JSON request body.
    ///
    /// Checks run in a fixed order and the first failing field is reported.
    /// Optional string fields of the wrong type are dropped, not rejected.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let conversation_id = match body.get("conversationId").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(ValidationError::new("conversationId", "Missing conversationId")),
        };

        let index = body
            .get("assistantMessageIndex")
            .filter(|v| v.is_number())
            .ok_or_else(|| {
                ValidationError::new("assistantMessageIndex", "Missing assistantMessageIndex")
            })?;
        let assistant_message_index = non_negative_integer(index, "assistantMessageIndex")?;

        let (input, output) = match (body.get("inputTokens"), body.get("outputTokens")) {
            (Some(i), Some(o)) if i.is_number() && o.is_number() => (i, o),
            _ => return Err(ValidationError::new("inputTokens", "Missing token counts")),
        };
        let input_tokens = non_negative_integer(input, "inputTokens")?;
        let output_tokens = non_negative_integer(output, "outputTokens")?;

        let total_cost_usd = body
            .get("totalCostUSD")
            .and_then(Value::as_f64)
            .ok_or_else(|| ValidationError::new("totalCostUSD", "Missing totalCostUSD"))?;
        if !total_cost_usd.is_finite() || total_cost_usd < 0.0 {
            return Err(ValidationError::new(
                "totalCostUSD",
                "Invalid totalCostUSD: must be a non-negative number",
            ));
        }

        let priced = body
            .get("priced")
            .and_then(Value::as_bool)
            .ok_or_else(|| ValidationError::new("priced", "Missing priced"))?;

        Ok(Self {
            conversation_id,
            assistant_message_index,
            model_id: optional_string(body, "modelId"),
            pricing_model_id: optional_string(body, "pricingModelId"),
            priced,
            input_tokens,
            output_tokens,
            total_cost_usd,
        })
    }
}

fn non_negative_integer(value: &Value, field: &'static str) -> Result<u64, ValidationError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    // Accept integral floats such as `3.0`.
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(ValidationError::new(
            field,
            format!("Invalid {field}: must be a non-negative integer"),
        )),
    }
}

fn optional_string(body: &Value, field: &str) -> Option<String> {
    body.get(field).and_then(Value::as_str).map(str::to_string)
}

/// One accepted usage measurement. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "usageEvent", rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub assistant_message_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_model_id: Option<String>,
    pub priced: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

impl UsageEvent {
    /// Discriminator stored in the `type` field of event documents.
    pub const DOC_TYPE: &'static str = "usageEvent";

    /// Deterministic idempotency key for an assistant message.
    pub fn key(user_id: &str, conversation_id: &str, assistant_message_index: u64) -> String {
        format!("usageEvent|{user_id}|{conversation_id}|{assistant_message_index}")
    }

    pub fn from_submission(user_id: &str, sub: UsageSubmission, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(user_id, &sub.conversation_id, sub.assistant_message_index),
            user_id: user_id.to_string(),
            conversation_id: sub.conversation_id,
            assistant_message_index: sub.assistant_message_index,
            model_id: sub.model_id,
            pricing_model_id: sub.pricing_model_id,
            priced: sub.priced,
            input_tokens: sub.input_tokens,
            output_tokens: sub.output_tokens,
            total_cost_usd: sub.total_cost_usd,
            created_at: now,
        }
    }
}

/// Running per-user aggregate. Counters only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "usageSummary", rename_all = "camelCase")]
pub struct UsageSummary {
    pub id: String,
    pub user_id: String,
    #[serde(default, rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
    #[serde(default)]
    pub total_assistant_messages: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageSummary {
    /// Discriminator stored in the `type` field of summary documents.
    pub const DOC_TYPE: &'static str = "usageSummary";

    pub fn key(user_id: &str) -> String {
        format!("usageSummary|{user_id}")
    }

    /// A zeroed summary for a user's first event.
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(user_id),
            user_id: user_id.to_string(),
            total_cost_usd: 0.0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_assistant_messages: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The summary after adding one event's deltas. Keeps `created_at`.
    pub fn with_event(&self, event: &UsageEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            total_cost_usd: self.total_cost_usd + event.total_cost_usd,
            total_input_tokens: self.total_input_tokens.saturating_add(event.input_tokens),
            total_output_tokens: self.total_output_tokens.saturating_add(event.output_tokens),
            total_assistant_messages: self.total_assistant_messages.saturating_add(1),
            created_at: self.created_at,
            updated_at: now,
        }
    }
}

/// Admin dashboard view over the usage documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageOverview {
    pub summaries: Vec<UsageSummary>,
    pub events: Vec<UsageEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "conversationId": "conv-1",
            "assistantMessageIndex": 3,
            "modelId": "gpt-4",
            "pricingModelId": "gpt-4-0613",
            "priced": true,
            "inputTokens": 120,
            "outputTokens": 80,
            "totalCostUSD": 0.0123
        })
    }

    #[test]
    fn test_valid_submission() {
        let sub = UsageSubmission::from_json(&valid_body()).unwrap();
        assert_eq!(sub.conversation_id, "conv-1");
        assert_eq!(sub.assistant_message_index, 3);
        assert_eq!(sub.model_id.as_deref(), Some("gpt-4"));
        assert!(sub.priced);
        assert_eq!(sub.input_tokens, 120);
        assert!((sub.total_cost_usd - 0.0123).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_fields_report_field_specific_messages() {
        let cases = [
            ("conversationId", "Missing conversationId"),
            ("assistantMessageIndex", "Missing assistantMessageIndex"),
            ("inputTokens", "Missing token counts"),
            ("outputTokens", "Missing token counts"),
            ("totalCostUSD", "Missing totalCostUSD"),
            ("priced", "Missing priced"),
        ];
        for (field, message) in cases {
            let mut body = valid_body();
            body.as_object_mut().unwrap().remove(field);
            let err = UsageSubmission::from_json(&body).unwrap_err();
            assert_eq!(err.message, message, "field {field}");
        }
    }

    #[test]
    fn test_wrong_types_rejected() {
        let mut body = valid_body();
        body["conversationId"] = json!(42);
        assert_eq!(
            UsageSubmission::from_json(&body).unwrap_err().message,
            "Missing conversationId"
        );

        let mut body = valid_body();
        body["priced"] = json!("yes");
        assert_eq!(
            UsageSubmission::from_json(&body).unwrap_err().message,
            "Missing priced"
        );

        let mut body = valid_body();
        body["assistantMessageIndex"] = json!("3");
        assert_eq!(
            UsageSubmission::from_json(&body).unwrap_err().field,
            "assistantMessageIndex"
        );
    }

    #[test]
    fn test_negative_and_fractional_counts_rejected() {
        let mut body = valid_body();
        body["inputTokens"] = json!(-1);
        assert_eq!(UsageSubmission::from_json(&body).unwrap_err().field, "inputTokens");

        let mut body = valid_body();
        body["outputTokens"] = json!(1.5);
        assert_eq!(UsageSubmission::from_json(&body).unwrap_err().field, "outputTokens");

        let mut body = valid_body();
        body["totalCostUSD"] = json!(-0.5);
        assert_eq!(UsageSubmission::from_json(&body).unwrap_err().field, "totalCostUSD");
    }

    #[test]
    fn test_empty_conversation_id_rejected() {
        let mut body = valid_body();
        body["conversationId"] = json!("");
        assert!(UsageSubmission::from_json(&body).is_err());
    }

    #[test]
    fn test_optional_strings_of_wrong_type_dropped() {
        let mut body = valid_body();
        body["modelId"] = json!(7);
        let sub = UsageSubmission::from_json(&body).unwrap();
        assert_eq!(sub.model_id, None);
    }

    #[test]
    fn test_event_key_is_deterministic() {
        assert_eq!(UsageEvent::key("u-1", "conv-1", 4), "usageEvent|u-1|conv-1|4");
        assert_eq!(UsageSummary::key("u-1"), "usageSummary|u-1");
    }

    #[test]
    fn test_event_document_shape() {
        let sub = UsageSubmission::from_json(&valid_body()).unwrap();
        let event = UsageEvent::from_submission("u-1", sub, Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "usageEvent");
        assert_eq!(json["id"], "usageEvent|u-1|conv-1|3");
        assert_eq!(json["totalCostUSD"], 0.0123);
        assert_eq!(json["assistantMessageIndex"], 3);
    }

    #[test]
    fn test_summary_accumulates() {
        let now = Utc::now();
        let sub = UsageSubmission::from_json(&valid_body()).unwrap();
        let event = UsageEvent::from_submission("u-1", sub, now);

        let summary = UsageSummary::empty("u-1", now)
            .with_event(&event, now)
            .with_event(&event, now);
        assert_eq!(summary.total_input_tokens, 240);
        assert_eq!(summary.total_output_tokens, 160);
        assert_eq!(summary.total_assistant_messages, 2);
        assert!((summary.total_cost_usd - 0.0246).abs() < 1e-12);
        assert_eq!(summary.created_at, now);
    }

    #[test]
    fn test_summary_deserializes_with_missing_counters() {
        let json = json!({
            "id": "usageSummary|u-1",
            "type": "usageSummary",
            "userId": "u-1",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        let summary: UsageSummary = serde_json::from_value(json).unwrap();
        assert_eq!(summary.total_assistant_messages, 0);
    }
}
