//! Route modules and the assembled application router.

use axum::Router;

use crate::state::AppState;

pub mod events;
pub mod health;
pub mod replays;

/// Builds the full application router. Middleware layers are added by the
/// binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/events", events::router())
        .nest("/api/v1/replays", replays::router())
        .with_state(state)
}
