//! `PostgreSQL` implementation of the event store contracts.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use chronicle_core::clock::Clock;
use chronicle_core::criteria::{Criteria, Page};
use chronicle_core::error::StoreError;
use chronicle_core::event::{EventRecord, NewEvent, RecordParts, Tombstone};
use chronicle_core::store::{EventReadStore, EventWriteStore};

use crate::query::{self, EVENT_COLUMNS};

/// PostgreSQL-backed event store.
///
/// Rows in `domain_events` are never updated or deleted; the table carries a
/// trigger rejecting both. Soft deletes insert into `domain_event_tombstones`.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for PgEventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    aggregate_type: String,
    aggregate_id: String,
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        EventRecord::from_parts(RecordParts {
            id: row.id,
            event_type: row.event_type,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            payload: row.payload,
            timestamp: row.timestamp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[allow(clippy::needless_pass_by_value)]
fn infrastructure(err: sqlx::Error) -> StoreError {
    StoreError::Infrastructure(err.to_string())
}

#[async_trait]
impl EventWriteStore for PgEventStore {
    async fn append(&self, event: NewEvent) -> Result<EventRecord, StoreError> {
        event.validate()?;
        let id = event.id.unwrap_or_else(Uuid::now_v7);
        let record = event.into_record(id, self.clock.now_micros());

        let result = sqlx::query(
            r#"INSERT INTO domain_events
                (id, event_type, aggregate_type, aggregate_id, payload, "timestamp", created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(record.id())
        .bind(record.event_type())
        .bind(record.aggregate_type())
        .bind(record.aggregate_id())
        .bind(record.payload())
        .bind(record.timestamp())
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(event_id = %id, event_type = record.event_type(), "event appended");
                Ok(record)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateId(id))
            }
            Err(e) => Err(infrastructure(e)),
        }
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<EventRecord>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS}
             FROM domain_events e
             LEFT JOIN domain_event_tombstones t ON t.event_id = e.id
             WHERE e.id = $1 AND ($2 OR t.event_id IS NULL)"
        ))
        .bind(id)
        .bind(include_deleted)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(row.map(EventRecord::from))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM domain_events WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(infrastructure)?;
        if !exists {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO domain_event_tombstones (event_id, deleted_at)
             VALUES ($1, $2)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(id)
        .bind(self.clock.now_micros())
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;

        tx.commit().await.map_err(infrastructure)?;
        debug!(event_id = %id, "event tombstoned");
        Ok(true)
    }

    async fn tombstone(&self, id: Uuid) -> Result<Option<Tombstone>, StoreError> {
        let row: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT event_id, deleted_at FROM domain_event_tombstones WHERE event_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(row.map(|(event_id, deleted_at)| Tombstone {
            event_id,
            deleted_at,
        }))
    }
}

#[async_trait]
impl EventReadStore for PgEventStore {
    async fn find_by_criteria(
        &self,
        criteria: &Criteria,
    ) -> Result<Page<EventRecord>, StoreError> {
        criteria.validate()?;

        let mut count_query = query::count(criteria)?;
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure)?;

        let mut page_query = query::select_page(criteria)?;
        let rows: Vec<EventRow> = page_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;

        Ok(Page::new(
            rows.into_iter().map(EventRecord::from).collect(),
            u64::try_from(total).unwrap_or_default(),
            criteria.pagination,
        ))
    }
}
