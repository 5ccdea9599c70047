//! Health, readiness and statistics endpoints
//!
//! Read-only snapshots for monitoring probes; no mutation.

use crate::http::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use aula_sfu::SfuStats;
use serde::{Deserialize, Serialize};

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/readyz", get(readiness_check))
        .route("/api/stats", get(stats))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Readiness: the worker pool either came up at startup or the process
/// never started serving, so a live server is a ready server.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ready": true,
        "workers": state.sfu.worker_count(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub sfu: SfuStats,
    pub uptime_seconds: u64,
}

/// Aggregate worker/room/transport/producer/consumer counts.
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        sfu: state.sfu.stats().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
