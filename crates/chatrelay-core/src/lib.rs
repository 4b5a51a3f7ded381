//! Core of the chat relay: history windowing, response fan-out, chat logging
//! and usage accounting.
//!
//! This crate defines the "ports" (`CompletionProvider`, `Ledger`) that the
//! infrastructure layer implements. It depends only on `chatrelay-types` --
//! never on `chatrelay-infra` or any database/IO crate.

pub mod chat;
pub mod dashboard;
pub mod ledger;
pub mod llm;
pub mod policy;
pub mod stream;
pub mod supervisor;
pub mod usage;
