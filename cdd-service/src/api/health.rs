//! Health check endpoint
//!
//! Reports uptime plus the state of the clinical attribute cache. A cache
//! that is invalid or stale reports `degraded`; the endpoint itself always
//! answers 200.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::cache::CacheStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub cache: CacheStatus,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let cache = state.cache.status().await;
    let status = if cache.valid && !cache.stale {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "cdd-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        cache,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
