//! Replay request and report types.

pub mod report;
pub mod request;
