//! Best-effort persistence of completed exchanges.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use chatrelay_types::chat::ChatRecord;
use chatrelay_types::error::{LedgerError, RelayError};

use crate::ledger::{LazyLedger, LedgerContainer};
use crate::policy::{Boundary, Disposition, disposition};

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Written,
    /// The ledger could not be acquired; the record was dropped.
    LedgerUnavailable,
    /// The write itself failed; the record was dropped.
    Failed(LedgerError),
}

/// Writes one `ChatRecord` document per exchange.
///
/// Never fails from the caller's point of view. The ledger handle is
/// acquired once and shared; if that acquisition failed, every later call
/// drops its record quietly since the failure has already been reported.
#[derive(Clone)]
pub struct ChatLogger {
    ledger: Arc<LazyLedger>,
}

impl ChatLogger {
    pub fn new(ledger: Arc<LazyLedger>) -> Self {
        Self { ledger }
    }

    pub async fn log(&self, record: &ChatRecord) -> LogOutcome {
        let container = match self.ledger.container().await {
            Ok(container) => container,
            Err(_) => {
                debug!(record_id = %record.id, "ledger unavailable, chat record dropped");
                return LogOutcome::LedgerUnavailable;
            }
        };

        let written = match serde_json::to_value(record) {
            Ok(doc) => container.create(&doc).await,
            Err(e) => Err(LedgerError::Serialization(e.to_string())),
        };

        match written {
            Ok(()) => {
                info!(record_id = %record.id, answer_len = record.answer().len(), "chat record written");
                LogOutcome::Written
            }
            Err(e) => {
                let err = RelayError::Ledger(e.clone());
                match disposition(Boundary::ChatLogging, &err) {
                    Disposition::Absorb => {
                        warn!(record_id = %record.id, error = %err, "failed to write chat record");
                    }
                    // Nothing to hand the failure to from a detached write.
                    Disposition::Surface => {
                        error!(record_id = %record.id, error = %err, "failed to write chat record");
                    }
                }
                LogOutcome::Failed(e)
            }
        }
    }
}
