//! Where each kind of failure goes.
//!
//! Failures on the primary completion path reach the caller. Failures in the
//! logging and accounting paths stay local and are only reported to tracing:
//! a broken ledger may cost chat history or usage numbers, never a response.

use chatrelay_types::error::RelayError;

/// The place a failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The streamed chat response returned to the caller.
    ChatResponse,
    /// The detached task persisting a finished exchange.
    ChatLogging,
    /// The usage submission endpoint.
    UsageRecording,
    /// Admin dashboard reads.
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return the failure to the direct caller.
    Surface,
    /// Log it and carry on as if the operation succeeded.
    Absorb,
}

pub fn disposition(boundary: Boundary, error: &RelayError) -> Disposition {
    match (boundary, error) {
        // Bad input is always the caller's to fix.
        (_, RelayError::Validation(_)) => Disposition::Surface,

        (Boundary::ChatResponse, RelayError::UpstreamUnavailable(_))
        | (Boundary::ChatResponse, RelayError::MidStreamFailure(_)) => Disposition::Surface,
        (Boundary::ChatResponse, RelayError::Ledger(_)) => Disposition::Absorb,

        (Boundary::ChatLogging, _) => Disposition::Absorb,
        (Boundary::UsageRecording, _) => Disposition::Absorb,

        // No conversation to protect on the dashboard.
        (Boundary::Dashboard, _) => Disposition::Surface,
    }
}
