//! HTTP layer for the chat relay.
//!
//! Axum router for the chat, usage and dashboard endpoints, the
//! `{ "errors": [...] }` error envelope, and the client principal extractor.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
