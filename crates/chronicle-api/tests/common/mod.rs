//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chronicle_api::audit::AuditLogHandler;
use chronicle_api::routes;
use chronicle_api::state::AppState;
use chronicle_core::clock::Clock;
use chronicle_core::store::{EventReadStore, EventWriteStore};
use chronicle_event_store::{InMemoryEventStore, PgEventStore};
use chronicle_replay::{EventTypeRegistry, ReplayConfig, ReplayCoordinator};
use chronicle_test_support::FixedClock;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

/// Event types the test registry routes to the audit-log handler.
pub const REPLAYABLE_TYPES: [&str; 2] = ["OrderPlaced", "OrderShipped"];

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

fn build_app<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Router
where
    S: EventWriteStore + EventReadStore + 'static,
{
    let mut registry = EventTypeRegistry::new();
    for event_type in REPLAYABLE_TYPES {
        registry.register(event_type, Arc::new(AuditLogHandler));
    }
    let coordinator = ReplayCoordinator::new(
        store.clone(),
        Arc::new(registry),
        clock,
        ReplayConfig::default(),
    );
    routes::app(AppState::new(store.clone(), store, Arc::new(coordinator)))
}

/// Build the full app router over an in-memory store with a deterministic
/// clock. Uses the same route structure as `main.rs`.
pub fn build_test_app() -> Router {
    let clock = fixed_clock();
    build_app(Arc::new(InMemoryEventStore::new(clock.clone())), clock)
}

/// Build the full app router over a real `PgEventStore`.
pub fn build_pg_test_app(pool: PgPool) -> Router {
    let clock = fixed_clock();
    build_app(Arc::new(PgEventStore::new(pool, clock.clone())), clock)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the status.
pub async fn delete(app: &Router, uri: &str) -> StatusCode {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await.0
}

/// Append an event through the API and return its id.
pub async fn append(app: &Router, event_type: &str, aggregate_id: &str, timestamp: &str) -> String {
    let (status, json) = post_json(
        app,
        "/api/v1/events",
        &serde_json::json!({
            "event_type": event_type,
            "aggregate_type": "order",
            "aggregate_id": aggregate_id,
            "payload": {"source": "test"},
            "timestamp": timestamp,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "append failed: {json}");
    json["id"].as_str().unwrap().to_string()
}
