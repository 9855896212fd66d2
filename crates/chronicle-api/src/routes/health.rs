//! Liveness endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Body of GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Crate name of the running binary.
    pub service: &'static str,
    /// Crate version of the running binary.
    pub version: &'static str,
    /// Event types the replay coordinator can dispatch, sorted.
    pub replay_event_types: Vec<String>,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        replay_event_types: state
            .coordinator
            .registry()
            .event_types()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
