//! Per-connection signaling session
//!
//! One session per WebSocket connection. Requests are handled strictly
//! in arrival order; every request yields exactly one reply or error to
//! the caller, and state-changing operations additionally fan out events
//! to the rest of the room through the hub. A rejected request performs
//! no mutation and is never broadcast.

use crate::signaling::hub::{MessageSender, RoomMessageHub};
use crate::signaling::protocol::{
    CapabilitiesReply, ClientRequest, ConsumedReply, JoinedRoomReply, ProducedReply,
    RequestPayload, ServerMessage, TransportCreatedReply,
};
use aula_sfu::{
    MediaKind, ParticipantId, Role, RoomId, SfuError, SfuManager, TransportDirection,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error surfaced to the requesting client only.
#[derive(Debug)]
pub enum SignalingError {
    Sfu(SfuError),
    BadRequest(String),
}

impl SignalingError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Sfu(e) => e.kind(),
            Self::BadRequest(_) => "bad-request",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Sfu(e) => e.to_string(),
            Self::BadRequest(m) => m.clone(),
        }
    }
}

impl From<SfuError> for SignalingError {
    fn from(e: SfuError) -> Self {
        Self::Sfu(e)
    }
}

type DispatchResult = Result<serde_json::Value, SignalingError>;

pub struct Session {
    participant_id: ParticipantId,
    sfu: Arc<SfuManager>,
    hub: Arc<RoomMessageHub>,
    outbound: MessageSender,
    joined: Option<(RoomId, Role)>,
}

impl Session {
    #[must_use]
    pub fn new(
        participant_id: ParticipantId,
        sfu: Arc<SfuManager>,
        hub: Arc<RoomMessageHub>,
        outbound: MessageSender,
    ) -> Self {
        Self {
            participant_id,
            sfu,
            hub,
            outbound,
            joined: None,
        }
    }

    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Handle one raw text frame from the socket.
    pub async fn handle_frame(&mut self, text: &str) {
        match serde_json::from_str::<ClientRequest>(text) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!(
                    participant_id = %self.participant_id,
                    error = %e,
                    "Malformed signaling frame"
                );
                self.send(ServerMessage::Error {
                    id: 0,
                    kind: "bad-request".to_string(),
                    message: format!("malformed request: {e}"),
                });
            }
        }
    }

    /// Handle one parsed request, sending exactly one reply or error.
    pub async fn handle_request(&mut self, request: ClientRequest) {
        let id = request.id;
        match self.dispatch(request.payload).await {
            Ok(data) => self.send(ServerMessage::Reply { id, data }),
            Err(e) => {
                debug!(
                    participant_id = %self.participant_id,
                    kind = e.kind(),
                    "Request rejected"
                );
                self.send(ServerMessage::Error {
                    id,
                    kind: e.kind().to_string(),
                    message: e.message(),
                });
            }
        }
    }

    async fn dispatch(&mut self, payload: RequestPayload) -> DispatchResult {
        match payload {
            RequestPayload::JoinRoom { room_id, role } => self.join_room(room_id, role).await,
            RequestPayload::GetRouterCapabilities { room_id } => self.capabilities(room_id),
            RequestPayload::CreateTransport { direction } => {
                self.create_transport(direction).await
            }
            RequestPayload::ConnectTransport {
                transport_id,
                dtls_parameters,
            } => {
                self.require_joined()?;
                self.sfu
                    .connect_transport(&transport_id, dtls_parameters)
                    .await?;
                ack()
            }
            RequestPayload::Produce {
                transport_id,
                kind,
                rtp_parameters,
            } => self.produce(transport_id, kind, rtp_parameters).await,
            RequestPayload::Consume {
                transport_id,
                producer_id,
                rtp_capabilities,
            } => {
                let (room_id, _) = self.require_joined()?;
                let descriptor = self
                    .sfu
                    .create_consumer(
                        &room_id,
                        &self.participant_id,
                        &transport_id,
                        &producer_id,
                        &rtp_capabilities,
                    )
                    .await?;
                reply(&ConsumedReply {
                    consumer_id: descriptor.consumer_id,
                    producer_id: descriptor.producer_id,
                    rtp_parameters: descriptor.rtp_parameters,
                    state: descriptor.state,
                })
            }
            RequestPayload::PauseConsumer { consumer_id } => {
                self.require_joined()?;
                self.sfu.pause_consumer(&consumer_id).await?;
                ack()
            }
            RequestPayload::ResumeConsumer { consumer_id } => {
                self.require_joined()?;
                self.sfu.resume_consumer(&consumer_id).await?;
                ack()
            }
            RequestPayload::TeacherMute => self.teacher_muted(true),
            RequestPayload::TeacherUnmute => self.teacher_muted(false),
        }
    }

    async fn join_room(&mut self, room_id: String, role: Role) -> DispatchResult {
        if self.joined.is_some() {
            return Err(SignalingError::BadRequest(
                "connection already joined a room".to_string(),
            ));
        }
        let room_id = RoomId::from(room_id);
        let room = self.sfu.ensure_room(&room_id)?;
        self.sfu
            .add_participant(&room_id, self.participant_id.clone(), role)
            .await?;

        self.hub.subscribe(
            room_id.clone(),
            self.participant_id.clone(),
            self.outbound.clone(),
        );
        self.joined = Some((room_id.clone(), role));

        self.hub.broadcast_except(
            &room_id,
            &self.participant_id,
            &ServerMessage::ParticipantJoined {
                participant_id: self.participant_id.clone(),
                role,
            },
        );

        // Late-joining students learn about an already-live teacher stream.
        if role == Role::Student {
            if let Some((_, producer_id)) = self.sfu.teacher_producer(&room_id).await {
                self.hub.send_to(
                    &self.participant_id,
                    ServerMessage::TeacherAudioAvailable { producer_id },
                );
            }
        }

        info!(
            room_id = %room_id,
            participant_id = %self.participant_id,
            role = %role,
            "Participant joined room"
        );
        reply(&JoinedRoomReply {
            room_id: room_id.as_str().to_string(),
            role,
            router_capabilities: room.capabilities().clone(),
            participant_count: room.participant_count().await,
        })
    }

    fn capabilities(&self, room_id: Option<String>) -> DispatchResult {
        let room_id = match (room_id, self.joined.as_ref()) {
            (Some(explicit), _) => RoomId::from(explicit),
            (None, Some((joined, _))) => joined.clone(),
            (None, None) => {
                return Err(SignalingError::BadRequest(
                    "no room joined and no roomId supplied".to_string(),
                ))
            }
        };
        let capabilities = self.sfu.router_capabilities(&room_id)?;
        reply(&CapabilitiesReply {
            room_id: room_id.as_str().to_string(),
            router_capabilities: capabilities,
        })
    }

    async fn create_transport(&mut self, direction: TransportDirection) -> DispatchResult {
        let (room_id, role) = self.require_joined()?;
        if direction == TransportDirection::Send && !role.is_teacher() {
            return Err(SfuError::PermissionDenied(
                "only the teacher may create a send transport".to_string(),
            )
            .into());
        }
        let (transport_id, parameters) = self
            .sfu
            .create_transport(&room_id, &self.participant_id, direction)
            .await?;
        reply(&TransportCreatedReply {
            transport_id,
            direction,
            parameters,
        })
    }

    async fn produce(
        &mut self,
        transport_id: aula_sfu::TransportId,
        kind: MediaKind,
        rtp_parameters: aula_sfu::RtpParameters,
    ) -> DispatchResult {
        let (room_id, role) = self.require_joined()?;
        if !role.is_teacher() {
            return Err(
                SfuError::PermissionDenied("only the teacher may produce".to_string()).into(),
            );
        }
        if kind != MediaKind::Audio {
            return Err(SfuError::UnsupportedMediaKind(kind.to_string()).into());
        }

        let installed = self
            .sfu
            .create_producer(&room_id, &transport_id, &self.participant_id, rtp_parameters)
            .await?;

        self.hub.broadcast_except(
            &room_id,
            &self.participant_id,
            &ServerMessage::NewProducer {
                producer_id: installed.producer_id.clone(),
            },
        );
        reply(&ProducedReply {
            producer_id: installed.producer_id,
        })
    }

    fn teacher_muted(&self, muted: bool) -> DispatchResult {
        let (room_id, role) = self.require_joined()?;
        if !role.is_teacher() {
            return Err(SfuError::PermissionDenied(
                "only the teacher may toggle mute".to_string(),
            )
            .into());
        }
        self.hub.broadcast_except(
            &room_id,
            &self.participant_id,
            &ServerMessage::TeacherMuted { muted },
        );
        ack()
    }

    fn require_joined(&self) -> Result<(RoomId, Role), SignalingError> {
        self.joined
            .clone()
            .ok_or_else(|| SignalingError::BadRequest("join a room first".to_string()))
    }

    /// Run disconnect cleanup: release everything the participant owned
    /// and notify the rest of the room. Safe to call once; cleanup is
    /// silent (expected steady-state behavior, not a fault).
    pub async fn disconnect(&mut self) {
        let Some((room_id, role)) = self.joined.take() else {
            return;
        };
        let removed = self
            .sfu
            .remove_participant(&room_id, &self.participant_id)
            .await;

        self.hub.broadcast_except(
            &room_id,
            &self.participant_id,
            &ServerMessage::ParticipantLeft {
                participant_id: self.participant_id.clone(),
            },
        );
        if role.is_teacher() {
            self.hub
                .broadcast_except(&room_id, &self.participant_id, &ServerMessage::TeacherLeft);
        }
        self.hub.unsubscribe(&self.participant_id);

        info!(
            room_id = %room_id,
            participant_id = %self.participant_id,
            role = %role,
            room_destroyed = removed.as_ref().is_some_and(|r| r.room_now_empty),
            "Participant disconnected"
        );
    }

    fn send(&self, message: ServerMessage) {
        // Receiver dropping means the socket is gone; cleanup follows.
        let _ = self.outbound.send(message);
    }
}

fn reply<T: serde::Serialize>(data: &T) -> DispatchResult {
    serde_json::to_value(data)
        .map_err(|e| SignalingError::BadRequest(format!("reply serialization failed: {e}")))
}

fn ack() -> DispatchResult {
    Ok(serde_json::json!({}))
}
