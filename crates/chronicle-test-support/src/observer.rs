//! Test checkpoint observer.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_replay::{Checkpoint, CheckpointObserver, ReplayControl};
use uuid::Uuid;

/// Records every checkpoint. Optionally cancels a run once a given number of
/// checkpoints has been seen, simulating an operator stop.
#[derive(Debug, Default)]
pub struct RecordingCheckpointObserver {
    checkpoints: Mutex<Vec<Checkpoint>>,
    cancel_after: Option<(usize, ReplayControl)>,
}

impl RecordingCheckpointObserver {
    /// Creates an observer that only records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observer that cancels `control` after `count` checkpoints.
    #[must_use]
    pub fn cancelling_after(count: usize, control: ReplayControl) -> Self {
        Self {
            checkpoints: Mutex::new(Vec::new()),
            cancel_after: Some((count, control)),
        }
    }

    /// Returns a snapshot of the checkpoints recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointObserver for RecordingCheckpointObserver {
    async fn on_checkpoint(&self, _run_id: Uuid, checkpoint: &Checkpoint) {
        let seen = {
            let mut checkpoints = self.checkpoints.lock().unwrap();
            checkpoints.push(*checkpoint);
            checkpoints.len()
        };
        if let Some((count, control)) = &self.cancel_after {
            if seen >= *count {
                control.cancel();
            }
        }
    }
}
