//! HTTP server implementation using Axum.

use std::sync::Arc;
use std::time::Instant;

use axum::{Router, routing::get};
use tedclub_core::config::GatewayConfig;
use tedclub_core::traits::{CycleStore, Messenger};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CycleStore>,
    pub messenger: Arc<dyn Messenger>,
    pub start_time: Instant,
    /// `(phase, slot)` pairs shown by `/api/v1/info`.
    pub schedule: Vec<(String, String)>,
    pub timezone: String,
}

impl AppState {
    pub fn new(store: Arc<dyn CycleStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            store,
            messenger,
            start_time: Instant::now(),
            schedule: Vec::new(),
            timezone: String::new(),
        }
    }

    pub fn with_schedule(mut self, timezone: &str, schedule: Vec<(String, String)>) -> Self {
        self.timezone = timezone.to_string();
        self.schedule = schedule;
        self
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/cycle", get(super::routes::current_cycle))
        .route("/api/v1/cycles", get(super::routes::recent_cycles))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve until `cancel` fires.
pub async fn start(
    config: &GatewayConfig,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    tracing::info!("🌐 Gateway server stopped");
    Ok(())
}
