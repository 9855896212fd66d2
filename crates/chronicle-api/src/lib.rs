//! Chronicle API: HTTP surface over the event store and replay engine.

pub mod audit;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
