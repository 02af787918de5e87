//! Pending-operation tracking for deferred archive writes
//!
//! Operations start running as soon as they are enqueued. [`WorkQueue::drain`]
//! waits for them and keeps waiting while finished operations leave new ones
//! behind, so a single pass over the list is never enough.

use crate::error::ArchiveError;
use parking_lot::Mutex;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// List of in-flight asynchronous mutations
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Create empty queue
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `operation` and track it until it finishes or the next drain
    ///
    /// The returned future resolves to the operation's output. Awaiting it
    /// is optional; the operation runs either way.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn enqueue<F, T>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<T, ArchiveError>> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            // Receiver may be gone when the caller did not keep the future.
            let _ = tx.send(operation.await);
        });
        let mut pending = self.pending.lock();
        pending.retain(|tracked| !tracked.is_finished());
        pending.push(handle);
        drop(pending);

        async move {
            rx.await.map_err(|_| {
                ArchiveError::OperationAborted("operation ended without a result".to_string())
            })
        }
    }

    /// Number of tracked operations that have not finished yet
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait until no tracked operation remains
    ///
    /// Must not be awaited from inside a queued operation of the same queue.
    pub async fn drain(&self) {
        loop {
            let batch = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                break;
            }

            tracing::debug!(count = batch.len(), "draining queued archive operations");
            for result in futures::future::join_all(batch).await {
                if let Err(e) = result {
                    tracing::warn!("queued archive operation aborted: {}", e);
                }
            }
        }
    }
}
