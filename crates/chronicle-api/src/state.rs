//! Shared application state.

use std::fmt;
use std::sync::Arc;

use chronicle_core::store::{EventReadStore, EventWriteStore};
use chronicle_replay::ReplayCoordinator;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Append, lookup and soft delete.
    pub write_store: Arc<dyn EventWriteStore>,
    /// Criteria listing.
    pub read_store: Arc<dyn EventReadStore>,
    /// Replay engine.
    pub coordinator: Arc<ReplayCoordinator>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        write_store: Arc<dyn EventWriteStore>,
        read_store: Arc<dyn EventReadStore>,
        coordinator: Arc<ReplayCoordinator>,
    ) -> Self {
        Self {
            write_store,
            read_store,
            coordinator,
        }
    }
}
