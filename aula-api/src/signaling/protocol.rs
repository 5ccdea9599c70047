//! Signaling wire protocol
//!
//! JSON text frames over the WebSocket. Every client request carries a
//! correlation `id`; the server answers each request with exactly one
//! `reply` or `error` addressed to that id, and separately pushes room
//! events (broadcasts) without an id.

use aula_sfu::{
    ConsumerId, ConsumerState, DtlsParameters, MediaKind, ParticipantId, ProducerId,
    RouterCapabilities, RtpCapabilities, RtpParameters, Role, TransportDirection,
    TransportParameters, TransportId,
};
use serde::{Deserialize, Serialize};

/// One inbound request frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRequest {
    pub id: u64,
    #[serde(flatten)]
    pub payload: RequestPayload,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RequestPayload {
    JoinRoom {
        room_id: String,
        role: Role,
    },
    GetRouterCapabilities {
        #[serde(default)]
        room_id: Option<String>,
    },
    CreateTransport {
        direction: TransportDirection,
    },
    ConnectTransport {
        transport_id: TransportId,
        dtls_parameters: DtlsParameters,
    },
    Produce {
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },
    Consume {
        transport_id: TransportId,
        producer_id: ProducerId,
        #[serde(default)]
        rtp_capabilities: RtpCapabilities,
    },
    PauseConsumer {
        consumer_id: ConsumerId,
    },
    ResumeConsumer {
        consumer_id: ConsumerId,
    },
    TeacherMute,
    TeacherUnmute,
}

/// One outbound frame: a reply/error correlated to a request, or a
/// pushed room event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Reply {
        id: u64,
        data: serde_json::Value,
    },
    Error {
        id: u64,
        kind: String,
        message: String,
    },
    ParticipantJoined {
        participant_id: ParticipantId,
        role: Role,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    TeacherLeft,
    NewProducer {
        producer_id: ProducerId,
    },
    TeacherAudioAvailable {
        producer_id: ProducerId,
    },
    TeacherMuted {
        muted: bool,
    },
}

// Typed reply payloads, serialized into `ServerMessage::Reply.data`.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoomReply {
    pub room_id: String,
    pub role: Role,
    pub router_capabilities: RouterCapabilities,
    pub participant_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesReply {
    pub room_id: String,
    pub router_capabilities: RouterCapabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportCreatedReply {
    pub transport_id: TransportId,
    pub direction: TransportDirection,
    #[serde(flatten)]
    pub parameters: TransportParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducedReply {
    pub producer_id: ProducerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedReply {
    pub consumer_id: ConsumerId,
    pub producer_id: ProducerId,
    pub rtp_parameters: RtpParameters,
    pub state: ConsumerState,
}
