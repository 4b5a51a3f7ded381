//! Usage submission handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::{Value, json};

use chatrelay_core::policy::{Boundary, Disposition, disposition};
use chatrelay_types::error::RelayError;
use chatrelay_types::identity::Identity;
use chatrelay_types::usage::UsageSubmission;

use crate::http::error::AppError;
use crate::http::extractors::principal::ClientPrincipal;
use crate::state::AppState;

/// POST /api/usage - Record token usage for one assistant message.
///
/// Invalid bodies get a 400. After validation the answer is always 200:
/// `{"ok": true}` when the event was stored (or already present), and
/// `{"ok": false}` when the ledger could not take it.
pub async fn record_usage(
    State(state): State<AppState>,
    principal: ClientPrincipal,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let submission = UsageSubmission::from_json(&body).map_err(RelayError::from)?;
    let user_id = Identity::accounting_id(principal.identity.as_ref());

    match state.usage.record_submission(&user_id, submission).await {
        Ok(outcome) => {
            tracing::debug!(%user_id, ?outcome, "usage submission handled");
            Ok(Json(json!({ "ok": true })))
        }
        Err(e) => {
            let error = RelayError::Ledger(e);
            match disposition(Boundary::UsageRecording, &error) {
                Disposition::Absorb => {
                    tracing::warn!(%user_id, error = %error, "usage not recorded");
                    Ok(Json(json!({ "ok": false })))
                }
                Disposition::Surface => Err(error.into()),
            }
        }
    }
}
