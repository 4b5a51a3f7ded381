use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health - Liveness plus the ledger's acquisition state.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let ledger = match state.ledger.is_available() {
        None => "pending",
        Some(true) => "available",
        Some(false) => "unavailable",
    };
    Json(json!({
        "status": "ok",
        "ledger": ledger,
        "backgroundTasks": state.supervisor.in_flight(),
    }))
}
