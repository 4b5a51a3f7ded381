//! Infrastructure layer for the chat relay.
//!
//! Contains implementations of the ports defined in `chatrelay-core`:
//! the SQLite document ledger, the OpenAI-compatible completion provider,
//! and the TOML/environment configuration loader.

pub mod config;
pub mod llm;
pub mod sqlite;
