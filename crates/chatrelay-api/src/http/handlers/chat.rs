//! Chat completion handler.
//!
//! The response body is the model's text, streamed as it arrives. The
//! exchange is logged in the background once the stream completes.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use secrecy::SecretString;
use serde::Deserialize;

use chatrelay_core::chat::RelayRequest;
use chatrelay_types::llm::{Message, ModelInfo};

use crate::http::error::AppError;
use crate::http::extractors::principal::ClientPrincipal;
use crate::state::AppState;

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub model: ModelInfo,
    pub messages: Vec<Message>,
    /// Caller's own API key; empty means use the server's.
    #[serde(default)]
    pub key: Option<String>,
    /// System prompt; empty means the default.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// POST /api/chat - Stream a completion for the given conversation.
pub async fn chat(
    State(state): State<AppState>,
    principal: ClientPrincipal,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let request = RelayRequest {
        model: body.model,
        identity: principal.identity,
        system_prompt: body.prompt,
        messages: body.messages,
        api_key: body
            .key
            .filter(|k| !k.is_empty())
            .map(SecretString::from),
    };

    let stream = state.relay.relay(request).await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}
