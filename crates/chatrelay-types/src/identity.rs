use serde::{Deserialize, Serialize};

/// The caller's identity as resolved from request headers.
///
/// Stored verbatim as the `user` participant's info in chat records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
    pub identity_provider: String,
}

impl Identity {
    /// User id used when no identity is available.
    pub const ANONYMOUS: &'static str = "anonymous";

    /// Usage accounting key: the trimmed user id, or `anonymous`.
    pub fn accounting_id(identity: Option<&Identity>) -> String {
        identity
            .map(|id| id.user_id.trim())
            .filter(|id| !id.is_empty())
            .unwrap_or(Self::ANONYMOUS)
            .to_string()
    }
}
