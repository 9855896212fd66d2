//! Chronicle event store adapters.
//!
//! Two adapters implement both the write and the read contract:
//! [`PgEventStore`] for PostgreSQL and [`InMemoryEventStore`] for tests and
//! database-less runs.

pub mod memory;
pub mod pg_event_store;
mod query;
pub mod schema;

pub use memory::InMemoryEventStore;
pub use pg_event_store::PgEventStore;
