//! Token budget management for the conversation history window.
//!
//! The model's context window is split between the system prompt, a fixed
//! reserve for the model's own reply, and as much recent history as fits.

use chatrelay_types::chat::ConversationWindow;
use chatrelay_types::llm::Message;

use super::tokenizer::SharedTokenizer;

/// Default tokens held back for the model's reply.
pub const DEFAULT_RESERVE_TOKENS: usize = 1000;

/// Selects the most recent suffix of a conversation that fits a token budget.
///
/// Budget = `token_limit - reserve - tokens(system_prompt)`. Messages are
/// scanned newest-first and accepted while the running total stays within
/// budget; the scan stops at the first message that would overflow, so older
/// messages are never reconsidered. The windower has no model knowledge: the
/// caller supplies `token_limit` per request.
#[derive(Clone)]
pub struct HistoryWindower {
    tokenizer: SharedTokenizer,
    reserve: usize,
}

impl HistoryWindower {
    pub fn new(tokenizer: SharedTokenizer, reserve: usize) -> Self {
        Self { tokenizer, reserve }
    }

    /// Tokens available for messages once the prompt and reserve are paid for.
    ///
    /// `None` when the prompt and reserve alone exceed `token_limit`.
    pub fn budget(&self, system_prompt: &str, token_limit: usize) -> Option<usize> {
        token_limit
            .checked_sub(self.reserve)?
            .checked_sub(self.tokenizer.count_tokens(system_prompt))
    }

    /// Build the window for one request.
    ///
    /// An empty window (system prompt only) is a valid result when even the
    /// newest message does not fit.
    pub fn select(
        &self,
        system_prompt: &str,
        messages: &[Message],
        token_limit: usize,
    ) -> ConversationWindow {
        let Some(budget) = self.budget(system_prompt, token_limit) else {
            return ConversationWindow {
                system_prompt: system_prompt.to_string(),
                messages: Vec::new(),
                message_tokens: 0,
            };
        };

        let mut used = 0usize;
        let mut start = messages.len();
        for (idx, message) in messages.iter().enumerate().rev() {
            let cost = self.tokenizer.count_tokens(&message.content);
            if used + cost > budget {
                break;
            }
            used += cost;
            start = idx;
        }

        ConversationWindow {
            system_prompt: system_prompt.to_string(),
            messages: messages[start..].to_vec(),
            message_tokens: used,
        }
    }
}
