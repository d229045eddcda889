//! API route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tedclub_core::types::Cycle;

use super::server::AppState;

fn cycle_json(cycle: &Cycle) -> Value {
    let mut v = serde_json::to_value(cycle).unwrap_or_else(|_| json!({ "id": cycle.id }));
    v["state"] = json!(cycle.state().to_string());
    v
}

fn store_error(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    tracing::warn!("⚠️ Status query failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": e.to_string() })),
    )
}

/// Liveness plus reachability of the database and the messaging platform.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let store = state.store.ping();
    let messenger = state.messenger.health_check().await;

    let status = if store.is_ok() && messenger.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let describe = |r: &tedclub_core::Result<()>| match r {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    let mut body = json!({
        "status": if status == StatusCode::OK { "ok" } else { "degraded" },
        "service": "tedclub",
        "version": env!("CARGO_PKG_VERSION"),
        "store": describe(&store),
    });
    body[state.messenger.name()] = json!(describe(&messenger));
    (status, Json(body))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let schedule: serde_json::Map<String, Value> = state
        .schedule
        .iter()
        .map(|(phase, slot)| (phase.clone(), json!(slot)))
        .collect();
    Json(json!({
        "name": "tedclub",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "timezone": state.timezone,
        "schedule": schedule,
    }))
}

/// The cycle the next phase will act on, or `null`.
pub async fn current_cycle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cycle = state.store.current_cycle().map_err(store_error)?;
    Ok(Json(json!({ "cycle": cycle.as_ref().map(cycle_json) })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// Most recent cycles, newest first.
pub async fn recent_cycles(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cycles = state
        .store
        .recent_cycles(q.limit.clamp(1, 100))
        .map_err(store_error)?;
    Ok(Json(json!({
        "cycles": cycles.iter().map(cycle_json).collect::<Vec<_>>(),
    })))
}
