//! Routes for replay runs.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use chronicle_replay::{ReplayReport, ReplayRequest};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /
///
/// Runs the replay to completion and returns its report. Validation
/// rejections map to 4xx; everything after validation is reported in the
/// body's `status`.
#[instrument(skip(state, request), fields(from = %request.from, to = %request.to))]
async fn start_replay(
    State(state): State<AppState>,
    Json(request): Json<ReplayRequest>,
) -> Result<Json<ReplayReport>, ApiError> {
    let report = state.coordinator.replay(&request).await?;

    info!(run_id = %report.run_id, status = ?report.status, "replay request served");

    Ok(Json(report))
}

/// Returns the router for replays.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(start_replay))
}
