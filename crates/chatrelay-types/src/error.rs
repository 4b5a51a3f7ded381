use thiserror::Error;

/// Errors from ledger (document store) operations.
///
/// `Clone` so a memoized acquisition failure can be handed to every caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

/// Malformed caller input, reported against a single field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Umbrella error for relay and accounting operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("completion provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("completion stream failed mid-response: {0}")]
    MidStreamFailure(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::Conflict("usageEvent|u|c|1".to_string());
        assert_eq!(err.to_string(), "conflict: usageEvent|u|c|1");
        assert!(err.is_conflict());
        assert!(!LedgerError::Unavailable("down".to_string()).is_conflict());
    }

    #[test]
    fn test_validation_error_display_is_message() {
        let err = ValidationError::new("priced", "Missing priced");
        assert_eq!(err.to_string(), "Missing priced");
        assert_eq!(err.field, "priced");
    }

    #[test]
    fn test_relay_error_from_ledger() {
        let err: RelayError = LedgerError::Query("boom".to_string()).into();
        assert_eq!(err.to_string(), "query error: boom");
    }
}
