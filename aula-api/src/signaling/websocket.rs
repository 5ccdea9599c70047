//! WebSocket endpoint carrying the signaling protocol
//!
//! One persistent connection per participant. Outbound messages (replies
//! and room events alike) flow through a single unbounded channel drained
//! by a spawned pump task, so room broadcasts never block the request
//! loop. The socket closing is the participant's sole cancellation
//! signal: cleanup runs exactly once, after the inbound loop ends.

use crate::http::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use aula_sfu::ParticipantId;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Signaling messages are small; anything larger is a client bug.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// WebSocket handler for the signaling channel.
///
/// The roomId and role arrive later in `join-room`, supplied by the
/// external authorization layer; the connection itself carries no
/// credentials.
pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let participant_id = ParticipantId::generate();
    info!(participant_id = %participant_id, "Signaling connection established");

    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    // Pump server messages to the socket.
    let pump = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = crate::signaling::session::Session::new(
        participant_id.clone(),
        state.sfu.clone(),
        state.hub.clone(),
        outbound_tx,
    );

    // Requests from one connection are handled strictly in order.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_frame(text.as_str()).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {
                // Binary/ping/pong frames carry nothing in this protocol.
                debug!(participant_id = %participant_id, "Ignoring non-text frame");
            }
        }
    }

    session.disconnect().await;
    pump.abort();
    info!(participant_id = %participant_id, "Signaling connection closed");
}
