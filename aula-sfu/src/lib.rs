//! Classroom audio SFU (Selective Forwarding Unit)
//!
//! One teacher publishes an audio stream per room; every student in the
//! room receives a forwarded copy, without transcoding. This crate is
//! the resource orchestration layer: it owns the worker pool and the
//! per-room graph of router, transports, producers and consumers, and
//! enforces the structural invariants (single producer per room, no
//! self-consumption, cascading teardown on disconnect).
//!
//! The ICE/DTLS handshake and RTP packet forwarding live in the media
//! engine behind this boundary; control-plane operations here never
//! block that packet path.
//!
//! ## Architecture
//!
//! - **`SfuManager`**: multi-room orchestration, worker round-robin,
//!   id lookup tables
//! - **`Room`**: one router plus the participant graph, serialized
//!   behind a single per-room lock
//! - **`Participant`**: owns its transports, producer and consumers
//! - **`WorkerPool`**: fixed pool of media workers, one per CPU core

mod config;
mod error;
mod manager;
mod participant;
mod room;
mod rtc;
mod types;
mod worker;

pub use config::SfuConfig;
pub use error::{Result, SfuError};
pub use manager::{SfuManager, SfuStats};
pub use participant::{
    Consumer, ConsumerState, OwnedIds, Participant, Producer, ProducerState, Transport,
    TransportReplaced, TransportState,
};
pub use room::{
    ConsumerDescriptor, ConsumerInstalled, ProducerInstalled, RemovedParticipant, Room, RoomStats,
    TransportInstalled,
};
pub use rtc::{
    CodecCapability, DtlsFingerprint, DtlsParameters, IceCandidate, IceParameters,
    RouterCapabilities, RtcParameterFactory, RtpCapabilities, RtpParameters, TransportParameters,
};
pub use types::{
    ConsumerId, MediaKind, ParticipantId, ProducerId, Role, RoomId, TransportDirection,
    TransportId,
};
pub use worker::{Worker, WorkerPool};
