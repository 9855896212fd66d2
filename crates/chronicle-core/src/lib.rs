//! Chronicle Core: the immutable event log's shared vocabulary.
//!
//! This crate defines the event record, the criteria descriptor consumed by
//! read-side adapters, and the write/read store contracts. It contains no
//! infrastructure code.

pub mod clock;
pub mod criteria;
pub mod error;
pub mod event;
pub mod store;
