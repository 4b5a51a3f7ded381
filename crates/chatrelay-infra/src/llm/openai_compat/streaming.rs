//! SSE decoding for OpenAI-style chat completion streams.
//!
//! Each `data:` event carries a JSON chunk; the text of
//! `choices[0].delta.content` is forwarded as UTF-8 bytes. The stream ends at
//! `[DONE]` or the first chunk with a `finish_reason`.

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use chatrelay_core::llm::provider::ByteStream;
use chatrelay_types::llm::StreamError;

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// What a single SSE `data` payload means for the byte stream.
#[derive(Debug, PartialEq)]
enum ChunkEvent {
    Text { text: String, finished: bool },
    Done,
}

fn parse_data(data: &str) -> Result<ChunkEvent, StreamError> {
    if data.trim() == DONE_MARKER {
        return Ok(ChunkEvent::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| StreamError(format!("malformed stream chunk: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(StreamError(format!("upstream error: {}", err.message)));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(ChunkEvent::Text {
            text: String::new(),
            finished: false,
        });
    };

    Ok(ChunkEvent::Text {
        text: choice.delta.content.unwrap_or_default(),
        finished: choice.finish_reason.is_some(),
    })
}

/// Turn a raw SSE body into the relay's text byte stream.
pub fn completion_text_stream<S, B, E>(body: S) -> ByteStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = Box::pin(body.eventsource());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(StreamError(e.to_string()));
                    return;
                }
            };

            match parse_data(&event.data) {
                Ok(ChunkEvent::Done) => return,
                Ok(ChunkEvent::Text { text, finished }) => {
                    if !text.is_empty() {
                        yield Ok(Bytes::from(text));
                    }
                    if finished {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "completion stream failed");
                    yield Err(e);
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type Body = futures_util::stream::Iter<std::vec::IntoIter<Result<Bytes, std::io::Error>>>;

    fn body(parts: &[&str]) -> Body {
        let owned: Vec<Result<Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures_util::stream::iter(owned)
    }

    async fn collect(stream: ByteStream) -> (String, Option<StreamError>) {
        let mut text = String::new();
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            match item {
                Ok(bytes) => text.push_str(std::str::from_utf8(&bytes).unwrap()),
                Err(e) => return (text, Some(e)),
            }
        }
        (text, None)
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
        )
    }

    #[test]
    fn test_parse_done_marker() {
        assert_eq!(parse_data("[DONE]").unwrap(), ChunkEvent::Done);
    }

    #[test]
    fn test_parse_role_only_delta_is_empty_text() {
        let event = parse_data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(
            event,
            ChunkEvent::Text {
                text: String::new(),
                finished: false
            }
        );
    }

    #[test]
    fn test_parse_error_object() {
        let err = parse_data(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(err.0.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_stream_emits_deltas_until_done() {
        let a = delta("Hel");
        let b = delta("lo");
        let ignored = delta("ignored");
        let stream = completion_text_stream(body(&[
            a.as_str(),
            b.as_str(),
            "data: [DONE]\n\n",
            ignored.as_str(),
        ]));
        let (text, err) = collect(stream).await;
        assert_eq!(text, "Hello");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_stream_handles_events_split_across_chunks() {
        let event = delta("split ok");
        let (head, tail) = event.split_at(10);
        let stream = completion_text_stream(body(&[head, tail, "data: [DONE]\n\n"]));
        let (text, err) = collect(stream).await;
        assert_eq!(text, "split ok");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_stream_stops_at_finish_reason() {
        let last = format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": "!"}, "finish_reason": "stop"}]})
        );
        let (hi, late) = (delta("Hi"), delta("late"));
        let stream = completion_text_stream(body(&[hi.as_str(), last.as_str(), late.as_str()]));
        let (text, err) = collect(stream).await;
        assert_eq!(text, "Hi!");
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_stream_malformed_chunk_is_terminal_error() {
        let (partial, after) = (delta("partial"), delta("x"));
        let stream = completion_text_stream(body(&[
            partial.as_str(),
            "data: {not json\n\n",
            after.as_str(),
        ]));
        let (text, err) = collect(stream).await;
        assert_eq!(text, "partial");
        assert!(err.unwrap().0.contains("malformed"));
    }

    #[tokio::test]
    async fn test_stream_transport_error_is_terminal() {
        let items: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(delta("a"))),
            Err(std::io::Error::other("connection reset")),
        ];
        let stream = completion_text_stream(futures_util::stream::iter(items));
        let (text, err) = collect(stream).await;
        assert_eq!(text, "a");
        assert!(err.unwrap().0.contains("connection reset"));
    }
}
