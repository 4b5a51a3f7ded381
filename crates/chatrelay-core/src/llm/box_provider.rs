//! BoxCompletionProvider -- object-safe dynamic dispatch wrapper for CompletionProvider.
//!
//! 1. Define an object-safe `CompletionProviderDyn` trait with boxed futures
//! 2. Blanket-impl `CompletionProviderDyn` for all `T: CompletionProvider`
//! 3. `BoxCompletionProvider` wraps `Box<dyn CompletionProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chatrelay_types::llm::ProviderError;

use super::provider::{ByteStream, ChatCompletionRequest, CompletionProvider};

/// Object-safe version of [`CompletionProvider`] with boxed futures.
pub trait CompletionProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn stream_chat_boxed<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, ProviderError>> + Send + 'a>>;
}

impl<T: CompletionProvider> CompletionProviderDyn for T {
    fn name(&self) -> &str {
        CompletionProvider::name(self)
    }

    fn stream_chat_boxed<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, ProviderError>> + Send + 'a>> {
        Box::pin(self.stream_chat(request))
    }
}

/// Type-erased completion provider for runtime backend selection.
///
/// Since `CompletionProvider` uses RPITIT it cannot be a trait object
/// directly; this wrapper re-implements the trait by delegation so it can be
/// used anywhere a `CompletionProvider` is expected.
pub struct BoxCompletionProvider {
    inner: Box<dyn CompletionProviderDyn + Send + Sync>,
}

impl BoxCompletionProvider {
    pub fn new<T: CompletionProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }
}

impl CompletionProvider for BoxCompletionProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ByteStream, ProviderError> {
        self.inner.stream_chat_boxed(request).await
    }
}
