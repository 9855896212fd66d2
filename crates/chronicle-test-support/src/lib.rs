//! Shared test doubles and utilities for Chronicle.

mod clock;
mod handler;
mod observer;
mod store;

pub use clock::FixedClock;
pub use handler::{PanickingHandler, RecordingHandler, SlowHandler};
pub use observer::RecordingCheckpointObserver;
pub use store::{FailingEventStore, FlakyReadStore};
