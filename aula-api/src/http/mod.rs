// Module: http
// HTTP/JSON surface: capability queries, health/stats probes, and the
// WebSocket upgrade for the signaling channel.

pub mod capabilities;
pub mod error;
pub mod health;

use crate::signaling::hub::RoomMessageHub;
use crate::signaling::websocket::websocket_handler;
use axum::{routing::get, Router};
use aula_sfu::SfuManager;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sfu: Arc<SfuManager>,
    pub hub: Arc<RoomMessageHub>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(sfu: Arc<SfuManager>) -> Self {
        Self {
            sfu,
            hub: Arc::new(RoomMessageHub::new()),
            started_at: Instant::now(),
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::create_health_router())
        .route(
            "/api/rooms/{room_id}/capabilities",
            get(capabilities::get_router_capabilities),
        )
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
