//! SFU error taxonomy
//!
//! Every variant here is recoverable at the signaling boundary: it is
//! returned to the originating caller as a structured error reply and
//! never affects other participants or rooms. Worker death is the one
//! fatal condition and is reported through the worker pool's liveness
//! channel instead (see [`crate::worker::WorkerPool::subscribe_death`]).

use crate::types::{ConsumerId, ParticipantId, ProducerId, RoomId, TransportId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SfuError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("transport not found: {0}")]
    TransportNotFound(TransportId),

    #[error("producer not found: {0}")]
    ProducerNotFound(ProducerId),

    #[error("consumer not found: {0}")]
    ConsumerNotFound(ConsumerId),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("cannot consume own producer: {0}")]
    SelfConsumeRejected(ProducerId),

    #[error("unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    #[error("transport {0} has wrong direction for this operation")]
    InvalidTransportDirection(TransportId),

    #[error("room limit reached ({0} rooms)")]
    RoomLimitReached(usize),

    #[error("participant limit reached for room {0}")]
    ParticipantLimitReached(RoomId),

    #[error("worker pool initialization failed: {0}")]
    WorkerPoolInit(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SfuError {
    /// Stable machine-readable kind string used in signaling error replies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room-not-found",
            Self::ParticipantNotFound(_) => "participant-not-found",
            Self::TransportNotFound(_) => "transport-not-found",
            Self::ProducerNotFound(_) => "producer-not-found",
            Self::ConsumerNotFound(_) => "consumer-not-found",
            Self::PermissionDenied(_) => "permission-denied",
            Self::SelfConsumeRejected(_) => "self-consume-rejected",
            Self::UnsupportedMediaKind(_) => "unsupported-media-kind",
            Self::InvalidTransportDirection(_) => "invalid-transport-direction",
            Self::RoomLimitReached(_) => "room-limit-reached",
            Self::ParticipantLimitReached(_) => "participant-limit-reached",
            Self::WorkerPoolInit(_) => "worker-pool-init",
            Self::InvalidConfig(_) => "invalid-config",
        }
    }
}

pub type Result<T> = std::result::Result<T, SfuError>;
