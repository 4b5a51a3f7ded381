//! SQLite storage layer.
//!
//! Document ledger backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod ledger;
pub mod pool;

pub use ledger::{SqliteContainer, SqliteLedger};
pub use pool::DatabasePool;
