//! Routes for appending, reading and listing events.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use chrono::{DateTime, Utc};
use chronicle_core::criteria::{
    Criteria, DEFAULT_PER_PAGE, EventField, Filter, FilterValue, Operator, Page, Sort,
};
use chronicle_core::error::StoreError;
use chronicle_core::event::{EventRecord, NewEvent};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct AppendEventRequest {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Event type tag.
    pub event_type: String,
    /// Owning aggregate kind.
    pub aggregate_type: String,
    /// Owning aggregate instance.
    pub aggregate_id: String,
    /// Event payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl From<AppendEventRequest> for NewEvent {
    fn from(request: AppendEventRequest) -> Self {
        Self {
            id: request.id,
            event_type: request.event_type,
            aggregate_type: request.aggregate_type,
            aggregate_id: request.aggregate_id,
            payload: request.payload,
            timestamp: request.timestamp,
        }
    }
}

/// Query string for GET /{id}.
#[derive(Debug, Default, Deserialize)]
pub struct GetEventParams {
    /// Also return soft-deleted events.
    #[serde(default)]
    pub include_deleted: bool,
}

/// One predicate of a listing query. The operand is read according to the
/// field's kind.
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    /// Filtered field.
    pub field: EventField,
    /// Comparison operator.
    pub operator: Operator,
    /// Raw operand: a string, or an array of strings for `in`.
    pub value: serde_json::Value,
}

/// Request body for POST /query.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueryEventsRequest {
    /// Conjunction of predicates.
    pub filters: Vec<FilterRequest>,
    /// Sort keys; `timestamp` ascending when empty.
    pub sorts: Vec<Sort>,
    /// One-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
    /// Include soft-deleted events.
    pub include_deleted: bool,
}

impl QueryEventsRequest {
    fn into_criteria(self) -> Result<Criteria, StoreError> {
        let mut criteria = Criteria::new();
        for filter in self.filters {
            let value = FilterValue::from_json(filter.field, &filter.value)?;
            criteria = criteria.filter(Filter::new(filter.field, filter.operator, value));
        }
        for sort in self.sorts {
            criteria = criteria.sort(sort);
        }
        Ok(criteria
            .paginate(
                self.page.unwrap_or(1),
                self.per_page.unwrap_or(DEFAULT_PER_PAGE),
            )
            .include_deleted(self.include_deleted))
    }
}

/// Event as returned over HTTP.
#[derive(Debug, Serialize)]
pub struct EventView {
    /// Event id.
    pub id: Uuid,
    /// Event type tag.
    pub event_type: String,
    /// Owning aggregate kind.
    pub aggregate_type: String,
    /// Owning aggregate instance.
    pub aggregate_id: String,
    /// Event payload.
    pub payload: serde_json::Value,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// When the event was appended.
    pub created_at: DateTime<Utc>,
    /// Equal to `created_at`; records are immutable.
    pub updated_at: DateTime<Utc>,
    /// Set when the event has been soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EventView {
    fn new(record: EventRecord, deleted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: record.id(),
            event_type: record.event_type().to_owned(),
            aggregate_type: record.aggregate_type().to_owned(),
            aggregate_id: record.aggregate_id().to_owned(),
            payload: record.payload().clone(),
            timestamp: record.timestamp(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
            deleted_at,
        }
    }
}

async fn deleted_at(state: &AppState, id: Uuid) -> Result<Option<DateTime<Utc>>, ApiError> {
    Ok(state
        .write_store
        .tombstone(id)
        .await?
        .map(|tombstone| tombstone.deleted_at))
}

/// POST /
#[instrument(
    skip(state, request),
    fields(event_type = %request.event_type, aggregate_id = %request.aggregate_id)
)]
async fn append_event(
    State(state): State<AppState>,
    Json(request): Json<AppendEventRequest>,
) -> Result<(StatusCode, Json<EventView>), ApiError> {
    let record = state.write_store.append(request.into()).await?;

    info!(event_id = %record.id(), "event appended");

    Ok((StatusCode::CREATED, Json(EventView::new(record, None))))
}

/// GET /{id}
#[instrument(skip(state, params), fields(include_deleted = params.include_deleted))]
async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<GetEventParams>,
) -> Result<Json<EventView>, ApiError> {
    let record = state
        .write_store
        .find_by_id(id, params.include_deleted)
        .await?
        .ok_or(ApiError::NotFound(id))?;

    let deleted_at = if params.include_deleted {
        deleted_at(&state, id).await?
    } else {
        None
    };

    Ok(Json(EventView::new(record, deleted_at)))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.write_store.soft_delete(id).await? {
        info!("event soft-deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

/// POST /query
#[instrument(skip(state, request), fields(filters = request.filters.len()))]
async fn query_events(
    State(state): State<AppState>,
    Json(request): Json<QueryEventsRequest>,
) -> Result<Json<Page<EventView>>, ApiError> {
    let include_deleted = request.include_deleted;
    let criteria = request.into_criteria()?;
    let page = state.read_store.find_by_criteria(&criteria).await?;

    let mut deleted = Vec::with_capacity(page.items.len());
    for record in &page.items {
        deleted.push(if include_deleted {
            deleted_at(&state, record.id()).await?
        } else {
            None
        });
    }
    let mut deleted = deleted.into_iter();

    Ok(Json(page.map(|record| {
        EventView::new(record, deleted.next().flatten())
    })))
}

/// Returns the router for events.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(append_event))
        .route("/query", post(query_events))
        .route("/{id}", get(get_event).delete(delete_event))
}
