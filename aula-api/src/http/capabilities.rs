//! Out-of-band router capability endpoint
//!
//! Clients need a room's negotiated codec descriptor before they can
//! join over the signaling channel, so this is plain HTTP with no open
//! WebSocket required. Querying a room that does not exist yet creates
//! it (capability queries may precede the first join).

use crate::http::{AppResult, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use aula_sfu::{RoomId, RouterCapabilities};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    pub room_id: String,
    pub router_capabilities: RouterCapabilities,
}

/// Path: `GET /api/rooms/{room_id}/capabilities`
pub async fn get_router_capabilities(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let room_id = RoomId::from(room_id);
    let router_capabilities = state.sfu.router_capabilities(&room_id)?;
    Ok(Json(CapabilitiesResponse {
        room_id: room_id.as_str().to_string(),
        router_capabilities,
    }))
}
