//! Language-model abstractions for the relay.
//!
//! - `CompletionProvider`: RPITIT trait for concrete streaming backends
//! - `BoxCompletionProvider`: object-safe wrapper for dynamic dispatch
//! - `Tokenizer`: pluggable token counting
//! - `HistoryWindower`: fits conversation history into a token budget

pub mod box_provider;
pub mod provider;
pub mod token_budget;
pub mod tokenizer;
