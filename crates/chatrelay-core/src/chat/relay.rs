//! CompletionRelay: windows the history, calls the provider, and splits the
//! response between the caller and the background chat log.

use futures_util::StreamExt;
use futures_util::stream;
use secrecy::SecretString;
use tracing::{Instrument, debug, info, info_span, warn};

use chatrelay_types::chat::ChatRecord;
use chatrelay_types::error::{RelayError, ValidationError};
use chatrelay_types::identity::Identity;
use chatrelay_types::llm::{Message, ModelInfo};

use crate::chat::logger::ChatLogger;
use crate::llm::provider::{ByteStream, ChatCompletionRequest, CompletionProvider};
use crate::llm::token_budget::HistoryWindower;
use crate::stream::{collect_text, tee};
use crate::supervisor::TaskSupervisor;

/// One inbound chat request.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub model: ModelInfo,
    pub identity: Option<Identity>,
    /// `None` or empty selects the default system prompt.
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub api_key: Option<SecretString>,
}

pub struct CompletionRelay<P: CompletionProvider> {
    provider: P,
    windower: HistoryWindower,
    logger: ChatLogger,
    supervisor: TaskSupervisor,
    default_system_prompt: String,
}

impl<P: CompletionProvider> CompletionRelay<P> {
    pub fn new(
        provider: P,
        windower: HistoryWindower,
        logger: ChatLogger,
        supervisor: TaskSupervisor,
        default_system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            windower,
            logger,
            supervisor,
            default_system_prompt: default_system_prompt.into(),
        }
    }

    /// Start a completion and return the caller's copy of the response.
    ///
    /// Returns once the provider has produced its first chunk (or ended
    /// without one). Failing before that point is `UpstreamUnavailable` and
    /// nothing is logged. Later failures reach the returned stream as a
    /// terminal error while the chat log still records the partial answer.
    pub async fn relay(&self, request: RelayRequest) -> Result<ByteStream, RelayError> {
        let span = info_span!(
            "gen_ai.relay",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %request.model.id,
            gen_ai.request.token_limit = request.model.token_limit,
            gen_ai.request.stream = true,
        );
        self.relay_inner(request).instrument(span).await
    }

    async fn relay_inner(&self, request: RelayRequest) -> Result<ByteStream, RelayError> {
        let RelayRequest {
            model,
            identity,
            system_prompt,
            messages,
            api_key,
        } = request;

        let question = match messages.last() {
            Some(last) => last.content.clone(),
            None => {
                return Err(ValidationError::new("messages", "messages must not be empty").into());
            }
        };

        let system_prompt = system_prompt
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.default_system_prompt.clone());

        let window = self
            .windower
            .select(&system_prompt, &messages, model.token_limit as usize);
        info!(
            total_messages = messages.len(),
            window_messages = window.messages.len(),
            window_tokens = window.message_tokens,
            "history window selected"
        );

        let mut upstream = self
            .provider
            .stream_chat(ChatCompletionRequest {
                model: model.clone(),
                system_prompt: window.system_prompt,
                api_key,
                messages: window.messages,
            })
            .await
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

        // Nothing has reached the caller yet, so an immediate error is still
        // an upstream failure rather than a truncated answer.
        let first = match upstream.next().await {
            Some(Ok(chunk)) => Some(chunk),
            Some(Err(e)) => return Err(RelayError::UpstreamUnavailable(e.to_string())),
            None => None,
        };
        let source: ByteStream = Box::pin(stream::iter(first.map(Ok)).chain(upstream));

        let (to_caller, to_log) = tee(source);

        let logger = self.logger.clone();
        self.supervisor.spawn(
            "chat_log",
            async move {
                let collected = collect_text(to_log).await;
                if let Some(err) = &collected.error {
                    warn!(
                        error = %err,
                        partial_len = collected.text.len(),
                        "completion stream failed mid-response, logging partial answer"
                    );
                }

                let record = ChatRecord::new(identity, question, model, collected.text);
                let outcome = logger.log(&record).await;
                debug!(record_id = %record.id, ?outcome, "chat log task finished");

                match collected.error {
                    Some(err) => Err(RelayError::MidStreamFailure(err.0)),
                    None => Ok(()),
                }
            }
            .in_current_span(),
        );

        Ok(to_caller.into_byte_stream())
    }
}
