//! Caller identity from the `x-ms-client-principal` header.
//!
//! The fronting auth proxy sets the header to base64-encoded JSON:
//! `{ "userId", "userDetails", "identityProvider", "userRoles" }`.
//! An absent or undecodable header means an anonymous caller; extraction
//! itself never fails.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use chatrelay_types::identity::Identity;

use crate::http::error::AppError;

pub const PRINCIPAL_HEADER: &str = "x-ms-client-principal";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrincipal {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_details: Option<String>,
    #[serde(default)]
    identity_provider: Option<String>,
    #[serde(default)]
    user_roles: Vec<String>,
}

/// The authenticated caller, if any, and their roles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientPrincipal {
    pub identity: Option<Identity>,
    pub roles: Vec<String>,
}

impl ClientPrincipal {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(raw) = headers.get(PRINCIPAL_HEADER).and_then(|v| v.to_str().ok()) else {
            return Self::default();
        };

        match decode(raw) {
            Some(principal) => principal,
            None => {
                tracing::debug!("ignoring undecodable client principal header");
                Self::default()
            }
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn require_role(&self, role: &str) -> Result<(), AppError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Role '{role}' required")))
        }
    }
}

fn decode(raw: &str) -> Option<ClientPrincipal> {
    let bytes = STANDARD.decode(raw.trim()).ok()?;
    let principal: RawPrincipal = serde_json::from_slice(&bytes).ok()?;

    let identity = principal
        .user_id
        .filter(|id| !id.trim().is_empty())
        .map(|user_id| Identity {
            user_id,
            user_name: principal.user_details.unwrap_or_default(),
            identity_provider: principal.identity_provider.unwrap_or_default(),
        });

    Some(ClientPrincipal {
        identity,
        roles: principal.user_roles,
    })
}

impl<S: Send + Sync> FromRequestParts<S> for ClientPrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
pub(crate) fn encode_principal(json: &serde_json::Value) -> String {
    STANDARD.encode(json.to_string())
}
