//! Test replay handlers.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chronicle_core::event::EventRecord;
use chronicle_replay::{HandlerError, ReplayHandler};
use uuid::Uuid;

/// A handler that records the id of every event it receives, in call order.
/// Events whose id is in the failing set are recorded and then rejected.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<Uuid>>,
    failing: HashSet<Uuid>,
}

impl RecordingHandler {
    /// Creates a handler that accepts every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler that fails for the given event ids.
    #[must_use]
    pub fn failing_on(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            failing: ids.into_iter().collect(),
        }
    }

    /// Returns a snapshot of the ids received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seen(&self) -> Vec<Uuid> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplayHandler for RecordingHandler {
    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(event.id());
        if self.failing.contains(&event.id()) {
            return Err(HandlerError::Failed(format!("rejected {}", event.id())));
        }
        Ok(())
    }
}

/// A handler that sleeps before succeeding. Useful for dispatch timeouts.
#[derive(Debug)]
pub struct SlowHandler(pub Duration);

#[async_trait]
impl ReplayHandler for SlowHandler {
    async fn handle(&self, _event: &EventRecord) -> Result<(), HandlerError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// A handler that panics on every event.
#[derive(Debug)]
pub struct PanickingHandler;

#[async_trait]
impl ReplayHandler for PanickingHandler {
    async fn handle(&self, event: &EventRecord) -> Result<(), HandlerError> {
        panic!("handler exploded on {}", event.id());
    }
}
