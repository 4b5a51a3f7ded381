//! Owner of the detached work a request leaves behind.
//!
//! Chat logging runs after the response has been handed back, so nothing
//! awaits it. The supervisor tracks those tasks, logs their failures and
//! panics, and lets shutdown wait a bounded time for them to finish.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Outcome of a shutdown drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub abandoned: usize,
}

#[derive(Clone, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background. Errors and panics are logged under
    /// `name` and go no further.
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let span = info_span!("background_task", task = name);
        self.tracker.spawn(
            async move {
                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(())) => debug!("background task finished"),
                    Ok(Err(e)) => warn!(error = %e, "background task failed"),
                    Err(panic) => {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "non-string panic payload".to_string());
                        error!(panic = %message, "background task panicked");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting tasks and wait up to `timeout` for running ones.
    ///
    /// Tasks still running at the deadline are left to die with the process.
    pub async fn shutdown(&self, timeout: Duration) -> DrainReport {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, timeout_secs = timeout.as_secs(), "draining background tasks");
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => DrainReport { abandoned: 0 },
            Err(_) => {
                let abandoned = self.tracker.len();
                warn!(abandoned, "background tasks abandoned at shutdown");
                DrainReport { abandoned }
            }
        }
    }
}
