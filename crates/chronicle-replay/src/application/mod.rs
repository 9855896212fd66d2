//! Replay orchestration: handler registry, coordinator and stream dispatcher.

pub mod control;
pub mod coordinator;
mod dispatch;
pub mod registry;
