//! Pluggable token counting used for history budgeting.
//!
//! Counts are only ever compared against a budget; text is never decoded
//! back from tokens, so an approximate counter is acceptable as long as it
//! does not systematically undercount.

use std::sync::Arc;

/// Converts text to a token count.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Character-based estimate: one token per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone)]
pub struct HeuristicTokenizer {
    chars_per_token: usize,
}

impl HeuristicTokenizer {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Arc-wrapped tokenizer for sharing across requests.
pub type SharedTokenizer = Arc<dyn Tokenizer>;
