//! Memoized, lazily acquired ledger container.
//!
//! The first caller opens the container; concurrent first callers wait on the
//! same attempt. The outcome, success or failure, is kept for the life of the
//! process, so a store that is down at first use is reported once and then
//! skipped rather than retried on every request.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info};

use chatrelay_types::error::LedgerError;

use super::{BoxLedger, BoxLedgerContainer, Ledger};

pub struct LazyLedger {
    ledger: BoxLedger,
    database_id: String,
    container_id: String,
    handle: OnceCell<Result<Arc<BoxLedgerContainer>, LedgerError>>,
}

impl LazyLedger {
    pub fn new<L: Ledger + 'static>(
        ledger: L,
        database_id: impl Into<String>,
        container_id: impl Into<String>,
    ) -> Self {
        Self {
            ledger: BoxLedger::new(ledger),
            database_id: database_id.into(),
            container_id: container_id.into(),
            handle: OnceCell::new(),
        }
    }

    /// The shared container handle, acquiring it on first use.
    pub async fn container(&self) -> Result<Arc<BoxLedgerContainer>, LedgerError> {
        self.handle
            .get_or_init(|| async {
                match self
                    .ledger
                    .open_container(&self.database_id, &self.container_id)
                    .await
                {
                    Ok(container) => {
                        info!(
                            database_id = %self.database_id,
                            container_id = %self.container_id,
                            "ledger container acquired"
                        );
                        Ok(Arc::new(container))
                    }
                    Err(e) => {
                        error!(
                            database_id = %self.database_id,
                            container_id = %self.container_id,
                            error = %e,
                            "ledger acquisition failed, persistence disabled until restart"
                        );
                        Err(e)
                    }
                }
            })
            .await
            .clone()
    }

    /// `None` before the first acquisition attempt completes.
    pub fn is_available(&self) -> Option<bool> {
        self.handle.get().map(Result::is_ok)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::ledger::memory::{InMemoryContainer, InMemoryLedger};
    use crate::ledger::{DocumentQuery, LedgerContainer};

    /// Counts acquisitions and takes a while to open, widening the race window.
    struct SlowCountingLedger {
        inner: InMemoryLedger,
        opens: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Ledger for SlowCountingLedger {
        type Container = InMemoryContainer;

        async fn open_container(
            &self,
            database_id: &str,
            container_id: &str,
        ) -> Result<InMemoryContainer, LedgerError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(LedgerError::Unavailable("no credentials".to_string()));
            }
            self.inner.open_container(database_id, container_id).await
        }
    }

    fn lazy(fail: bool) -> (Arc<LazyLedger>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let ledger = SlowCountingLedger {
            inner: InMemoryLedger::new(),
            opens: opens.clone(),
            fail,
        };
        (Arc::new(LazyLedger::new(ledger, "db", "Chatbot")), opens)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_acquires_once() {
        let (lazy, opens) = lazy(false);
        assert_eq!(lazy.is_available(), None);

        let mut handles = Vec::new();
        for i in 0..16 {
            let lazy = lazy.clone();
            handles.push(tokio::spawn(async move {
                let container = lazy.container().await.unwrap();
                container.create(&json!({"id": format!("doc-{i}")})).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.is_available(), Some(true));
        let all = lazy.container().await.unwrap().query(&DocumentQuery::all()).await.unwrap();
        assert_eq!(all.len(), 16);
    }

    #[tokio::test]
    async fn test_failure_is_memoized() {
        let (lazy, opens) = lazy(true);

        for _ in 0..5 {
            match lazy.container().await {
                Ok(_) => panic!("acquisition should stay failed"),
                Err(err) => assert_eq!(err, LedgerError::Unavailable("no credentials".to_string())),
            }
        }
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.is_available(), Some(false));
    }
}
