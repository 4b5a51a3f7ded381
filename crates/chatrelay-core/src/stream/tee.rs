//! One-producer / two-consumer fan-out of a response byte stream.
//!
//! A pump task reads the source and pushes every item into one unbounded
//! queue per branch. Each branch therefore buffers whatever its consumer has
//! not read yet, and a slow or dropped consumer can never hold back the other
//! branch or the upstream read loop. The pump stops reading upstream only
//! once both branches are gone.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

use chatrelay_types::llm::StreamError;

use crate::llm::provider::ByteStream;

/// What the pump hands to a branch.
#[derive(Debug, Clone)]
enum Frame {
    Chunk(Bytes),
    Fail(StreamError),
    End,
}

/// One independently consumable copy of a teed stream.
///
/// Yields the source's chunks in order, then either ends or yields the
/// source's terminal error. If the pump dies without signalling the end,
/// the branch reports an error rather than looking like a clean finish.
#[derive(Debug)]
pub struct TeeBranch {
    rx: UnboundedReceiver<Frame>,
    finished: bool,
}

impl Stream for TeeBranch {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let frame = ready!(self.rx.poll_recv(cx));
        match frame {
            Some(Frame::Chunk(bytes)) => Poll::Ready(Some(Ok(bytes))),
            Some(Frame::Fail(err)) => {
                self.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Some(Frame::End) => {
                self.finished = true;
                Poll::Ready(None)
            }
            None => {
                self.finished = true;
                Poll::Ready(Some(Err(StreamError(
                    "stream reader stopped before the end of the response".to_string(),
                ))))
            }
        }
    }
}

impl TeeBranch {
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(self)
    }
}

/// Duplicate `source` into two branches that receive identical bytes in
/// identical order.
///
/// Must be called from within a Tokio runtime: the pump runs as its own task
/// so that it keeps draining upstream regardless of which branch is polled.
pub fn tee(source: ByteStream) -> (TeeBranch, TeeBranch) {
    let (tx_a, rx_a) = unbounded_channel();
    let (tx_b, rx_b) = unbounded_channel();

    tokio::spawn(pump(source, [tx_a, tx_b]));

    (
        TeeBranch {
            rx: rx_a,
            finished: false,
        },
        TeeBranch {
            rx: rx_b,
            finished: false,
        },
    )
}

async fn pump(mut source: ByteStream, branches: [UnboundedSender<Frame>; 2]) {
    let mut open = [true, true];

    // Returns false once no branch is listening any more.
    let deliver = |frame: Frame, open: &mut [bool; 2]| -> bool {
        for (idx, tx) in branches.iter().enumerate() {
            if open[idx] && tx.send(frame.clone()).is_err() {
                debug!(branch = idx, "tee branch dropped by its consumer");
                open[idx] = false;
            }
        }
        open.iter().any(|o| *o)
    };

    while let Some(item) = source.next().await {
        match item {
            Ok(bytes) => {
                if !deliver(Frame::Chunk(bytes), &mut open) {
                    debug!("both tee branches dropped, abandoning upstream");
                    return;
                }
            }
            Err(err) => {
                warn!(error = %err, "upstream stream failed, closing both tee branches");
                deliver(Frame::Fail(err), &mut open);
                return;
            }
        }
    }

    deliver(Frame::End, &mut open);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::stream;

    use super::*;

    fn source_of(chunks: &[&'static str]) -> ByteStream {
        let items: Vec<Result<Bytes, StreamError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        Box::pin(stream::iter(items))
    }

    async fn drain(mut branch: TeeBranch) -> (Vec<u8>, Option<StreamError>) {
        let mut out = Vec::new();
        while let Some(item) = branch.next().await {
            match item {
                Ok(bytes) => out.extend_from_slice(&bytes),
                Err(err) => return (out, Some(err)),
            }
        }
        (out, None)
    }

    #[tokio::test]
    async fn test_both_branches_receive_all_bytes() {
        let (a, b) = tee(source_of(&["hel", "lo ", "wor", "ld"]));
        let (a_bytes, a_err) = drain(a).await;
        let (b_bytes, b_err) = drain(b).await;
        assert_eq!(a_bytes, b"hello world");
        assert_eq!(b_bytes, b"hello world");
        assert!(a_err.is_none() && b_err.is_none());
    }

    #[tokio::test]
    async fn test_interleaved_reads() {
        let (mut a, mut b) = tee(source_of(&["1", "2", "3", "4"]));
        let mut a_out = Vec::new();
        let mut b_out = Vec::new();

        // b reads two chunks before a reads anything
        b_out.extend_from_slice(&b.next().await.unwrap().unwrap());
        b_out.extend_from_slice(&b.next().await.unwrap().unwrap());
        while let Some(Ok(bytes)) = a.next().await {
            a_out.extend_from_slice(&bytes);
        }
        while let Some(Ok(bytes)) = b.next().await {
            b_out.extend_from_slice(&bytes);
        }
        assert_eq!(a_out, b"1234");
        assert_eq!(b_out, b"1234");
    }

    #[tokio::test]
    async fn test_abandoned_branch_does_not_stall_other() {
        let (a, b) = tee(source_of(&["x"; 1000]));
        drop(a);
        let (bytes, err) = tokio::time::timeout(Duration::from_secs(5), drain(b))
            .await
            .expect("surviving branch stalled");
        assert_eq!(bytes.len(), 1000);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_unread_branch_does_not_block_reader() {
        let (a, _b_never_read) = tee(source_of(&["chunk"; 500]));
        let (bytes, _) = tokio::time::timeout(Duration::from_secs(5), drain(a))
            .await
            .expect("reader blocked on the idle branch");
        assert_eq!(bytes.len(), 2500);
    }

    #[tokio::test]
    async fn test_upstream_error_reaches_both_branches() {
        let items: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(StreamError("connection reset".to_string())),
            Ok(Bytes::from_static(b"never delivered")),
        ];
        let (a, b) = tee(Box::pin(stream::iter(items)));

        let (a_bytes, a_err) = drain(a).await;
        let (b_bytes, b_err) = drain(b).await;
        assert_eq!(a_bytes, b"partial");
        assert_eq!(b_bytes, b"partial");
        assert_eq!(a_err, Some(StreamError("connection reset".to_string())));
        assert_eq!(b_err, a_err);
    }

    #[tokio::test]
    async fn test_empty_source_ends_cleanly() {
        let (a, b) = tee(source_of(&[]));
        assert_eq!(drain(a).await, (Vec::new(), None));
        assert_eq!(drain(b).await, (Vec::new(), None));
    }

    #[tokio::test]
    async fn test_branch_is_fused_after_end() {
        let (mut a, _b) = tee(source_of(&["only"]));
        assert!(a.next().await.unwrap().is_ok());
        assert!(a.next().await.is_none());
        assert!(a.next().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_death_surfaces_as_error() {
        let panicking: ByteStream = Box::pin(stream::poll_fn(|_| -> Poll<Option<Result<Bytes, StreamError>>> {
            panic!("upstream decoder bug")
        }));
        let (a, b) = tee(panicking);
        assert!(drain(a).await.1.is_some());
        assert!(drain(b).await.1.is_some());
    }

    #[tokio::test]
    async fn test_dropping_both_branches_stops_upstream_reads() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = polled.clone();
        let endless: ByteStream = Box::pin(stream::repeat_with(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"."))
        }).then(|item| async move {
            tokio::task::yield_now().await;
            item
        }));

        let (a, b) = tee(endless);
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(a);
        drop(b);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_drop = polled.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        // at most one in-flight item after the pump notices
        assert!(polled.load(Ordering::SeqCst) <= after_drop + 1);
    }
}
