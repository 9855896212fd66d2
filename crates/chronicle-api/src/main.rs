//! Chronicle API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use chronicle_api::audit::AuditLogHandler;
use chronicle_api::config::AppConfig;
use chronicle_api::error::AppError;
use chronicle_api::state::AppState;
use chronicle_api::{routes, telemetry};
use chronicle_core::clock::{Clock, SystemClock};
use chronicle_event_store::PgEventStore;
use chronicle_event_store::schema::MIGRATOR;
use chronicle_replay::{EventTypeRegistry, ReplayCoordinator};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Chronicle API server");

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    if config.run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // Build application state.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(PgEventStore::new(pool, Arc::clone(&clock)));

    let mut registry = EventTypeRegistry::new();
    for event_type in &config.replay_event_types {
        registry.register(event_type.clone(), Arc::new(AuditLogHandler));
    }
    tracing::info!(event_types = ?registry.event_types(), "Replay handlers registered");

    let coordinator = ReplayCoordinator::new(
        store.clone(),
        Arc::new(registry),
        clock,
        config.replay.clone(),
    );
    let app_state = AppState::new(store.clone(), store, Arc::new(coordinator));

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
