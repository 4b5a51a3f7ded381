//! Admin dashboard handlers. Both require the `admin` role.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use chatrelay_types::chat::DashboardChatItem;
use chatrelay_types::usage::UsageOverview;

use crate::http::error::AppError;
use crate::http::extractors::principal::ClientPrincipal;
use crate::state::AppState;

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub chats: Vec<DashboardChatItem>,
}

/// GET /api/dashboard/chats - Most recent chat exchanges.
pub async fn recent_chats(
    State(state): State<AppState>,
    principal: ClientPrincipal,
) -> Result<Json<ChatsResponse>, AppError> {
    principal.require_role(ADMIN_ROLE)?;
    let chats = state.dashboard.recent_chats().await?;
    Ok(Json(ChatsResponse { chats }))
}

/// GET /api/dashboard/usage - Top spenders and latest usage events.
pub async fn usage_overview(
    State(state): State<AppState>,
    principal: ClientPrincipal,
) -> Result<Json<UsageOverview>, AppError> {
    principal.require_role(ADMIN_ROLE)?;
    let overview = state.dashboard.usage_overview().await?;
    Ok(Json(overview))
}
