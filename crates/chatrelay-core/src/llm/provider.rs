//! CompletionProvider trait definition.
//!
//! This is the abstraction every language-model backend implements. The
//! relay treats the response as opaque bytes and never parses the model's
//! wire protocol beyond what the provider itself chooses to emit.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use secrecy::SecretString;

use chatrelay_types::llm::{Message, ModelInfo, ProviderError, StreamError};

/// A finite, single-pass stream of response bytes ending in success or a
/// terminal [`StreamError`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send + 'static>>;

/// Everything a provider needs for one streamed completion.
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: ModelInfo,
    pub system_prompt: String,
    /// Caller-supplied key; `None` lets the provider fall back to its own.
    pub api_key: Option<SecretString>,
    pub messages: Vec<Message>,
}

/// Trait for completion backends.
///
/// Uses native async fn in traits (RPITIT). The returned future resolves
/// once the upstream has accepted the request; an error at that point means
/// no byte was produced. Failures after that travel inside the stream.
///
/// Implementations live in chatrelay-infra (e.g., `OpenAiCompatProvider`).
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    fn stream_chat(
        &self,
        request: ChatCompletionRequest,
    ) -> impl std::future::Future<Output = Result<ByteStream, ProviderError>> + Send;
}
