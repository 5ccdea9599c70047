//! Room state and per-room media graph
//!
//! A room owns exactly one router, bound for its entire life to one
//! worker chosen at creation time, and the full participant graph. All
//! mutable state sits behind a single `tokio::sync::Mutex`: requests
//! from different participants in the same room may interleave
//! arbitrarily, so every mutation is serialized through that one lock.
//! Rooms are fully independent; no cross-room locking exists.

use crate::error::{Result, SfuError};
use crate::participant::{
    Consumer, ConsumerState, OwnedIds, Participant, Producer, Transport,
};
use crate::rtc::{
    DtlsParameters, RouterCapabilities, RtcParameterFactory, RtpCapabilities, RtpParameters,
    TransportParameters,
};
use crate::types::{
    ConsumerId, ParticipantId, ProducerId, Role, RoomId, TransportDirection, TransportId,
};
use crate::worker::Worker;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Per-room routing context linking the teacher's producer to student
/// consumers. Capabilities are negotiated once at creation and immutable.
#[derive(Debug)]
pub struct Router {
    pub id: String,
    pub capabilities: RouterCapabilities,
}

impl Router {
    fn new() -> Self {
        Self {
            id: format!("router-{}", nanoid::nanoid!(10)),
            capabilities: RouterCapabilities::audio_only(),
        }
    }
}

/// Outcome of removing a participant, for signaling fan-out.
#[derive(Debug)]
pub struct RemovedParticipant {
    pub role: Role,
    pub owned: OwnedIds,
    pub was_teacher_producer: bool,
    pub room_now_empty: bool,
}

/// Outcome of installing a new producer.
#[derive(Debug)]
pub struct ProducerInstalled {
    pub producer_id: ProducerId,
    /// Producer that was closed to make way for this one, if any.
    pub superseded: Option<ProducerId>,
    /// Consumers closed along with the superseded producer.
    pub closed_consumers: Vec<ConsumerId>,
}

/// Outcome of creating a transport.
#[derive(Debug)]
pub struct TransportInstalled {
    pub transport_id: TransportId,
    pub parameters: TransportParameters,
    /// Same-direction transport that was closed and replaced, if any.
    pub replaced_transport: Option<TransportId>,
    /// Consumers closed because they rode the replaced transport.
    pub closed_consumers: Vec<ConsumerId>,
}

/// Outcome of creating a consumer.
#[derive(Debug)]
pub struct ConsumerInstalled {
    pub descriptor: ConsumerDescriptor,
    /// Earlier consumer of the same producer that was closed and
    /// replaced, if any.
    pub replaced: Option<ConsumerId>,
}

/// Descriptor returned to the consuming participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerDescriptor {
    pub consumer_id: ConsumerId,
    pub producer_id: ProducerId,
    pub rtp_parameters: RtpParameters,
    pub state: ConsumerState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomStats {
    pub participants: usize,
    pub students: usize,
    pub transports: usize,
    pub producers: usize,
    pub consumers: usize,
}

#[derive(Debug)]
struct RoomState {
    participants: HashMap<ParticipantId, Participant>,
    /// The room's single audio source: teacher participant + its producer.
    teacher: Option<(ParticipantId, ProducerId)>,
    students: HashSet<ParticipantId>,
}

#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    worker: Arc<Worker>,
    router: Router,
    state: Mutex<RoomState>,
}

impl Room {
    pub(crate) fn new(id: RoomId, worker: Arc<Worker>) -> Self {
        worker.router_created();
        let router = Router::new();
        info!(
            room_id = %id,
            router_id = %router.id,
            worker_id = %worker.id(),
            "Room created"
        );
        Self {
            id,
            worker,
            router,
            state: Mutex::new(RoomState {
                participants: HashMap::new(),
                teacher: None,
                students: HashSet::new(),
            }),
        }
    }

    #[must_use]
    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    #[must_use]
    pub fn router_id(&self) -> &str {
        &self.router.id
    }

    #[must_use]
    pub fn capabilities(&self) -> &RouterCapabilities {
        &self.router.capabilities
    }

    /// Close the router and release the worker slot. Called by the
    /// orchestrator once the participant map is empty.
    pub(crate) fn close(&self) {
        self.worker.router_closed();
        info!(room_id = %self.id, router_id = %self.router.id, "Room destroyed");
    }

    pub async fn participant_count(&self) -> usize {
        self.state.lock().await.participants.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.participants.is_empty()
    }

    pub async fn teacher_producer(&self) -> Option<(ParticipantId, ProducerId)> {
        self.state.lock().await.teacher.clone()
    }

    /// Register a participant. A re-join under the same id (reconnect
    /// before the old socket's cleanup ran) replaces the stale record
    /// after cascading its teardown.
    pub async fn add_participant(
        &self,
        participant_id: ParticipantId,
        role: Role,
        max_participants: usize,
    ) -> Result<Option<OwnedIds>> {
        let mut state = self.state.lock().await;

        let stale = state
            .participants
            .remove(&participant_id)
            .map(|mut old| old.close_all());
        if stale.is_some() {
            Self::clear_participant_refs(&mut state, &participant_id);
        }

        if max_participants > 0 && state.participants.len() >= max_participants {
            return Err(SfuError::ParticipantLimitReached(self.id.clone()));
        }

        if role == Role::Student {
            state.students.insert(participant_id.clone());
        }
        state.participants.insert(
            participant_id.clone(),
            Participant::new(participant_id.clone(), role),
        );

        debug!(
            room_id = %self.id,
            participant_id = %participant_id,
            role = %role,
            participants = state.participants.len(),
            "Participant added"
        );
        Ok(stale)
    }

    fn clear_participant_refs(state: &mut RoomState, participant_id: &ParticipantId) {
        state.students.remove(participant_id);
        if state
            .teacher
            .as_ref()
            .is_some_and(|(owner, _)| owner == participant_id)
        {
            state.teacher = None;
        }
    }

    /// Remove a participant, cascading closure of everything it owned.
    /// Returns `None` when the id is unknown (already removed).
    pub async fn remove_participant(
        &self,
        participant_id: &ParticipantId,
    ) -> Option<RemovedParticipant> {
        let mut state = self.state.lock().await;
        let mut participant = state.participants.remove(participant_id)?;
        let owned = participant.close_all();

        let was_teacher_producer = state
            .teacher
            .as_ref()
            .is_some_and(|(owner, _)| owner == participant_id);
        Self::clear_participant_refs(&mut state, participant_id);

        // Consumers other participants derived from this producer die too.
        let mut closed_elsewhere = Vec::new();
        if let Some(producer_id) = owned.producer.as_ref() {
            for other in state.participants.values_mut() {
                if let Some(consumer_id) = other.close_consumer_of(producer_id) {
                    closed_elsewhere.push(consumer_id);
                }
            }
        }
        let mut owned = owned;
        owned.consumers.extend(closed_elsewhere);

        let room_now_empty = state.participants.is_empty();
        debug!(
            room_id = %self.id,
            participant_id = %participant_id,
            role = %participant.role,
            room_now_empty,
            "Participant removed"
        );
        Some(RemovedParticipant {
            role: participant.role,
            owned,
            was_teacher_producer,
            room_now_empty,
        })
    }

    /// Create a transport for a participant, replacing any previous one of
    /// the same direction. Returns the connection parameters to relay to
    /// the remote peer plus every id closed by the replacement.
    pub async fn create_transport(
        &self,
        participant_id: &ParticipantId,
        direction: TransportDirection,
        factory: &RtcParameterFactory,
    ) -> Result<TransportInstalled> {
        let mut state = self.state.lock().await;
        let participant = state
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| SfuError::ParticipantNotFound(participant_id.clone()))?;

        let transport = Transport::new(direction, factory.transport_parameters());
        let transport_id = transport.id.clone();
        let parameters = transport.parameters.clone();
        let replaced = participant.install_transport(transport);

        // Replacing the send transport closed the producer riding it.
        if replaced.producer.is_some()
            && state
                .teacher
                .as_ref()
                .is_some_and(|(owner, _)| owner == participant_id)
        {
            state.teacher = None;
        }

        debug!(
            room_id = %self.id,
            participant_id = %participant_id,
            transport_id = %transport_id,
            direction = %direction,
            replaced = replaced.transport.is_some(),
            "Transport created"
        );
        Ok(TransportInstalled {
            transport_id,
            parameters,
            replaced_transport: replaced.transport,
            closed_consumers: replaced.consumers,
        })
    }

    /// Finalize a transport handshake with the peer's DTLS parameters.
    pub async fn connect_transport(
        &self,
        transport_id: &TransportId,
        remote_dtls: DtlsParameters,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let transport = state
            .participants
            .values_mut()
            .find_map(|p| p.transport_mut_by_id(transport_id))
            .ok_or_else(|| SfuError::TransportNotFound(transport_id.clone()))?;
        transport.connect(remote_dtls);
        debug!(room_id = %self.id, transport_id = %transport_id, "Transport connected");
        Ok(())
    }

    /// Accept an inbound audio stream on a send transport and install it
    /// as the room's single audio source. Any pre-existing live producer
    /// is closed first, together with every consumer derived from it.
    pub async fn create_producer(
        &self,
        transport_id: &TransportId,
        participant_id: &ParticipantId,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerInstalled> {
        let mut state = self.state.lock().await;

        {
            let participant = state
                .participants
                .get_mut(participant_id)
                .ok_or_else(|| SfuError::ParticipantNotFound(participant_id.clone()))?;
            let transport = participant
                .transport_mut_by_id(transport_id)
                .ok_or_else(|| SfuError::TransportNotFound(transport_id.clone()))?;
            if transport.direction != TransportDirection::Send {
                return Err(SfuError::InvalidTransportDirection(transport_id.clone()));
            }
        }

        // Supersede-with-close: never leave an orphaned producer behind.
        let mut closed_consumers = Vec::new();
        let superseded = if let Some((old_owner, old_producer)) = state.teacher.take() {
            if let Some(owner) = state.participants.get_mut(&old_owner) {
                if let Some(producer) = owner.producer.as_mut() {
                    producer.close();
                }
            }
            for participant in state.participants.values_mut() {
                if let Some(consumer_id) = participant.close_consumer_of(&old_producer) {
                    closed_consumers.push(consumer_id);
                }
            }
            Some(old_producer)
        } else {
            None
        };

        let producer = Producer::new(rtp_parameters);
        let producer_id = producer.id.clone();
        if let Some(participant) = state.participants.get_mut(participant_id) {
            participant.producer = Some(producer);
        }
        state.teacher = Some((participant_id.clone(), producer_id.clone()));

        info!(
            room_id = %self.id,
            participant_id = %participant_id,
            producer_id = %producer_id,
            superseded = superseded.is_some(),
            "Producer installed"
        );
        Ok(ProducerInstalled {
            producer_id,
            superseded,
            closed_consumers,
        })
    }

    /// Create a paused consumer forwarding the given producer to the
    /// participant's receive transport. A previous consumer of the same
    /// producer is closed and reported for index cleanup.
    pub async fn create_consumer(
        &self,
        participant_id: &ParticipantId,
        transport_id: &TransportId,
        producer_id: &ProducerId,
        _rtp_capabilities: &RtpCapabilities,
    ) -> Result<ConsumerInstalled> {
        let mut state = self.state.lock().await;

        let live = state
            .teacher
            .as_ref()
            .is_some_and(|(_, live_id)| live_id == producer_id);
        if !live {
            return Err(SfuError::ProducerNotFound(producer_id.clone()));
        }
        if state
            .teacher
            .as_ref()
            .is_some_and(|(owner, _)| owner == participant_id)
        {
            return Err(SfuError::SelfConsumeRejected(producer_id.clone()));
        }

        let rtp_parameters = state
            .teacher
            .as_ref()
            .and_then(|(owner, _)| state.participants.get(owner))
            .and_then(|p| p.producer.as_ref())
            .map(|p| p.rtp_parameters.clone())
            .unwrap_or_default();

        let participant = state
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| SfuError::ParticipantNotFound(participant_id.clone()))?;
        let recv_ok = participant
            .transport(TransportDirection::Recv)
            .is_some_and(|t| &t.id == transport_id && !t.is_closed());
        if !recv_ok {
            return Err(SfuError::TransportNotFound(transport_id.clone()));
        }

        let consumer = Consumer::new(producer_id.clone(), rtp_parameters);
        let descriptor = ConsumerDescriptor {
            consumer_id: consumer.id.clone(),
            producer_id: producer_id.clone(),
            rtp_parameters: consumer.rtp_parameters.clone(),
            state: consumer.state,
        };
        let replaced = participant
            .consumers
            .insert(producer_id.clone(), consumer)
            .filter(|old| old.state != ConsumerState::Closed)
            .map(|old| old.id);

        debug!(
            room_id = %self.id,
            participant_id = %participant_id,
            consumer_id = %descriptor.consumer_id,
            producer_id = %producer_id,
            replaced = replaced.is_some(),
            "Consumer created (paused)"
        );
        Ok(ConsumerInstalled {
            descriptor,
            replaced,
        })
    }

    /// Toggle a consumer's forwarding state. Setting the current state
    /// again is a no-op, not an error.
    pub async fn set_consumer_state(
        &self,
        consumer_id: &ConsumerId,
        resumed: bool,
    ) -> Result<ConsumerState> {
        let mut state = self.state.lock().await;
        let consumer = state
            .participants
            .values_mut()
            .find_map(|p| p.consumer_mut_by_id(consumer_id))
            .ok_or_else(|| SfuError::ConsumerNotFound(consumer_id.clone()))?;
        consumer.state = if resumed {
            ConsumerState::Resumed
        } else {
            ConsumerState::Paused
        };
        Ok(consumer.state)
    }

    pub async fn stats(&self) -> RoomStats {
        let state = self.state.lock().await;
        let mut stats = RoomStats {
            participants: state.participants.len(),
            students: state.students.len(),
            ..RoomStats::default()
        };
        for participant in state.participants.values() {
            let (transports, producers, consumers) = participant.live_counts();
            stats.transports += transports;
            stats.producers += producers;
            stats.consumers += consumers;
        }
        stats
    }
}
