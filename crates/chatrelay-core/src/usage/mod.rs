//! Usage accounting.

pub mod ledger;

pub use ledger::{UsageLedger, UsageOutcome};
