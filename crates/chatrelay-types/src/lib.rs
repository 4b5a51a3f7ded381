//! Shared domain types for the chat relay.
//!
//! Messages and model metadata, chat records, usage events and summaries,
//! configuration, and the error taxonomy shared by every crate.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod llm;
pub mod usage;
