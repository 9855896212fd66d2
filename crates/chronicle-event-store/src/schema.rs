//! Event store database schema.
//!
//! The DDL lives in the workspace `migrations/` directory; this module embeds
//! it and names the tables the adapters query.

use sqlx::migrate::Migrator;

/// Embedded migrations for the event store tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Append-only table holding one row per event.
pub const EVENTS_TABLE: &str = "domain_events";

/// Soft-delete markers, keyed by event id.
pub const TOMBSTONES_TABLE: &str = "domain_event_tombstones";
