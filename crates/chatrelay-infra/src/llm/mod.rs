//! Completion provider implementations.
//!
//! Contains the concrete [`CompletionProvider`] used by the relay and a
//! factory that builds it from configuration.
//!
//! [`CompletionProvider`]: chatrelay_core::llm::provider::CompletionProvider

pub mod openai_compat;

use chatrelay_core::llm::box_provider::BoxCompletionProvider;
use chatrelay_types::config::ProviderConfig;
use chatrelay_types::llm::ProviderError;

use self::openai_compat::OpenAiCompatProvider;

/// Create a [`BoxCompletionProvider`] from the `[provider]` configuration.
///
/// A missing API key is not an error here: requests may carry their own.
pub fn create_provider(config: &ProviderConfig) -> Result<BoxCompletionProvider, ProviderError> {
    let provider = OpenAiCompatProvider::new(config)?;
    tracing::info!(
        api_host = %config.api_host,
        has_default_key = config.api_key.as_deref().is_some_and(|k| !k.is_empty()),
        "completion provider configured"
    );
    Ok(BoxCompletionProvider::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::llm::provider::CompletionProvider;

    #[test]
    fn test_create_provider_without_key() {
        let provider = create_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
