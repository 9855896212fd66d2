//! Chronicle Replay: re-dispatches stored events to their handlers.
//!
//! A replay run scans a time window of the log in bounded batches ordered by
//! `(timestamp, id)`, dispatches each event to the handler registered for its
//! type, and checkpoints after every batch so an interrupted run can be
//! resumed. Delivery is at-least-once; handlers own idempotency.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;

pub use application::control::{CheckpointObserver, ReplayControl};
pub use application::coordinator::ReplayCoordinator;
pub use application::registry::{EventTypeRegistry, ReplayHandler, TypedReplayHandler};
pub use config::ReplayConfig;
pub use domain::report::{Checkpoint, EventFailure, FailureReason, ReplayReport, ReplayStatus};
pub use domain::request::ReplayRequest;
pub use error::{HandlerError, ReplayError};
