//! Byte-stream plumbing shared by the relay and its background logger.

pub mod tee;

use bytes::BytesMut;
use futures_util::StreamExt;

use chatrelay_types::llm::StreamError;

use crate::llm::provider::ByteStream;

pub use tee::{TeeBranch, tee};

/// Result of reading a response stream to its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedText {
    /// Everything received, decoded as UTF-8 once at the end so multi-byte
    /// characters split across chunks survive.
    pub text: String,
    /// Set when the stream ended with an error instead of completing.
    pub error: Option<StreamError>,
}

impl CollectedText {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Drain `stream`, concatenating all chunks until it ends or fails.
pub async fn collect_text<S>(mut stream: S) -> CollectedText
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, StreamError>> + Unpin,
{
    let mut buf = BytesMut::new();
    let mut error = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }

    CollectedText {
        text: String::from_utf8_lossy(&buf).into_owned(),
        error,
    }
}

/// Convenience for boxed streams.
pub async fn collect_byte_stream(stream: ByteStream) -> CollectedText {
    collect_text(stream).await
}
