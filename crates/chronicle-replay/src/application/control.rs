//! Run control: cancellation and checkpoint notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::report::Checkpoint;

/// Cancellation handle shared between a running replay and its caller.
///
/// Clones observe the same flag. A cancelled run stops at the next batch
/// boundary, or while waiting to retry a fetch.
#[derive(Debug, Clone)]
pub struct ReplayControl {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ReplayControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayControl {
    /// Creates an uncancelled handle.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleeps for `delay`; returns `true` early if cancelled meanwhile.
    pub(crate) async fn cancelled_within(&self, delay: Duration) -> bool {
        let mut rx = self.rx.clone();
        tokio::select! {
            () = tokio::time::sleep(delay) => self.is_cancelled(),
            changed = rx.wait_for(|cancelled| *cancelled) => changed.is_ok(),
        }
    }
}

/// Receives every checkpoint a run records, in order.
///
/// Persisting checkpoints is the caller's business; the engine only reports
/// them.
#[async_trait]
pub trait CheckpointObserver: Send + Sync {
    /// Called after batch `checkpoint.batch` has been fully attempted.
    async fn on_checkpoint(&self, run_id: Uuid, checkpoint: &Checkpoint);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_visible_to_clones() {
        let control = ReplayControl::new();
        let observer = control.clone();

        control.cancel();
        control.cancel();

        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_within_wakes_on_cancel() {
        let control = ReplayControl::new();
        let canceller = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert!(control.cancelled_within(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_cancelled_within_times_out_uncancelled() {
        let control = ReplayControl::new();

        assert!(!control.cancelled_within(Duration::from_millis(5)).await);
    }
}
