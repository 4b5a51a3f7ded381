//! The chat path: relaying a completion and logging the exchange.

pub mod logger;
pub mod relay;

pub use logger::{ChatLogger, LogOutcome};
pub use relay::{CompletionRelay, RelayRequest};
