//! SFU Manager - top-level orchestration of workers, rooms and media objects
//!
//! This module provides:
//! - Fixed worker pool creation with round-robin room assignment
//! - Room lifecycle (lazy creation, destruction when the last participant leaves)
//! - Transport/producer/consumer lifecycle on behalf of signaling requests
//! - Global statistics collection
//!
//! All lookups go through tables scoped to the manager instance; closed
//! objects are unindexed immediately so stale ids fail with a NotFound
//! kind instead of being silently applied.

use crate::config::SfuConfig;
use crate::error::{Result, SfuError};
use crate::participant::OwnedIds;
use crate::room::{ConsumerDescriptor, ProducerInstalled, RemovedParticipant, Room};
use crate::rtc::{
    DtlsParameters, RouterCapabilities, RtcParameterFactory, RtpCapabilities, RtpParameters,
    TransportParameters,
};
use crate::types::{
    ConsumerId, ParticipantId, ProducerId, Role, RoomId, TransportDirection, TransportId,
};
use crate::worker::WorkerPool;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Global manager statistics, aggregated across rooms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SfuStats {
    pub workers: usize,
    pub rooms: usize,
    pub participants: usize,
    pub transports: usize,
    pub producers: usize,
    pub consumers: usize,
}

/// Orchestrates the worker pool and the per-room media graph.
#[derive(Debug)]
pub struct SfuManager {
    config: Arc<SfuConfig>,
    pool: WorkerPool,
    factory: RtcParameterFactory,
    rooms: DashMap<RoomId, Arc<Room>>,
    /// Serializes room creation so the room limit holds under
    /// concurrent creators. Lookups never take it.
    create_lock: Mutex<()>,
    /// transport id -> owning room
    transports: DashMap<TransportId, RoomId>,
    /// consumer id -> owning room
    consumers: DashMap<ConsumerId, RoomId>,
}

impl SfuManager {
    /// Spawn the worker pool and build the manager. The configuration is
    /// validated and the pool must come up completely before any room
    /// operation is accepted; failure here is fatal to startup.
    pub fn new(config: SfuConfig) -> Result<Arc<Self>> {
        if let Err(errors) = config.validate() {
            return Err(SfuError::InvalidConfig(errors.join("; ")));
        }
        let pool = WorkerPool::spawn(&config)?;
        let factory = RtcParameterFactory::new(&config);
        info!(
            workers = pool.len(),
            max_rooms = config.max_rooms,
            max_participants_per_room = config.max_participants_per_room,
            "SFU manager initialized"
        );
        Ok(Arc::new(Self {
            config: Arc::new(config),
            pool,
            factory,
            rooms: DashMap::new(),
            create_lock: Mutex::new(()),
            transports: DashMap::new(),
            consumers: DashMap::new(),
        }))
    }

    /// Get or create a room, binding it to the next worker in round-robin
    /// order. Idempotent: concurrent calls for the same id create exactly
    /// one router, and the room limit holds even for concurrent creators
    /// of distinct rooms.
    pub fn ensure_room(&self, room_id: &RoomId) -> Result<Arc<Room>> {
        if let Some(room) = self.rooms.get(room_id) {
            return Ok(Arc::clone(room.value()));
        }
        let _guard = self.create_lock.lock();
        // Lost the race to another creator of the same room.
        if let Some(room) = self.rooms.get(room_id) {
            return Ok(Arc::clone(room.value()));
        }
        if self.config.max_rooms > 0 && self.rooms.len() >= self.config.max_rooms {
            return Err(SfuError::RoomLimitReached(self.rooms.len()));
        }
        let room = Arc::new(Room::new(room_id.clone(), self.pool.next_worker()));
        self.rooms.insert(room_id.clone(), Arc::clone(&room));
        Ok(room)
    }

    fn room(&self, room_id: &RoomId) -> Result<Arc<Room>> {
        self.rooms
            .get(room_id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| SfuError::RoomNotFound(room_id.clone()))
    }

    /// Capability descriptor for a room, auto-creating it: participants
    /// may query capabilities before anyone has joined.
    pub fn router_capabilities(&self, room_id: &RoomId) -> Result<RouterCapabilities> {
        Ok(self.ensure_room(room_id)?.capabilities().clone())
    }

    /// Register a participant in an existing room. Callers must
    /// `ensure_room` first.
    pub async fn add_participant(
        &self,
        room_id: &RoomId,
        participant_id: ParticipantId,
        role: Role,
    ) -> Result<()> {
        let room = self.room(room_id)?;
        let stale = room
            .add_participant(participant_id, role, self.config.max_participants_per_room)
            .await?;
        if let Some(owned) = stale {
            self.unindex(&owned);
        }
        Ok(())
    }

    /// Remove a participant, cascading closure of everything it owned and
    /// destroying the room once empty. Returns `None` when the room or
    /// participant is already gone (cleanup is expected steady-state, not
    /// a fault).
    pub async fn remove_participant(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> Option<RemovedParticipant> {
        let room = self.rooms.get(room_id).map(|r| Arc::clone(r.value()))?;
        let removed = room.remove_participant(participant_id).await?;
        self.unindex(&removed.owned);
        if removed.room_now_empty {
            if let Some((_, room)) = self.rooms.remove(room_id) {
                room.close();
            }
        }
        Some(removed)
    }

    /// Create a transport and return the connection parameters to relay to
    /// the remote peer. A previous transport of the same direction for the
    /// participant is closed and replaced, along with whatever rode it.
    pub async fn create_transport(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        direction: TransportDirection,
    ) -> Result<(TransportId, TransportParameters)> {
        let room = self.room(room_id)?;
        let installed = room
            .create_transport(participant_id, direction, &self.factory)
            .await?;
        if let Some(old) = installed.replaced_transport {
            self.transports.remove(&old);
        }
        for consumer_id in &installed.closed_consumers {
            self.consumers.remove(consumer_id);
        }
        self.transports
            .insert(installed.transport_id.clone(), room_id.clone());
        Ok((installed.transport_id, installed.parameters))
    }

    /// Finalize a transport handshake. Stale or unknown ids (e.g. the
    /// transport was already closed) fail with `TransportNotFound`.
    pub async fn connect_transport(
        &self,
        transport_id: &TransportId,
        remote_dtls: DtlsParameters,
    ) -> Result<()> {
        let room_id = self
            .transports
            .get(transport_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| SfuError::TransportNotFound(transport_id.clone()))?;
        self.room(&room_id)?
            .connect_transport(transport_id, remote_dtls)
            .await
    }

    /// Accept an inbound audio stream and register it as the room's single
    /// source, closing any pre-existing producer first.
    pub async fn create_producer(
        &self,
        room_id: &RoomId,
        transport_id: &TransportId,
        participant_id: &ParticipantId,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerInstalled> {
        let indexed_room = self
            .transports
            .get(transport_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| SfuError::TransportNotFound(transport_id.clone()))?;
        if &indexed_room != room_id {
            return Err(SfuError::TransportNotFound(transport_id.clone()));
        }
        let installed = self
            .room(room_id)?
            .create_producer(transport_id, participant_id, rtp_parameters)
            .await?;
        for consumer_id in &installed.closed_consumers {
            self.consumers.remove(consumer_id);
        }
        Ok(installed)
    }

    /// Create a paused consumer for a live producer in the same room. A
    /// previous consumer of the same producer is closed and unindexed.
    pub async fn create_consumer(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        transport_id: &TransportId,
        producer_id: &ProducerId,
        rtp_capabilities: &RtpCapabilities,
    ) -> Result<ConsumerDescriptor> {
        let installed = self
            .room(room_id)?
            .create_consumer(participant_id, transport_id, producer_id, rtp_capabilities)
            .await?;
        if let Some(replaced) = &installed.replaced {
            self.consumers.remove(replaced);
        }
        self.consumers
            .insert(installed.descriptor.consumer_id.clone(), room_id.clone());
        Ok(installed.descriptor)
    }

    pub async fn pause_consumer(&self, consumer_id: &ConsumerId) -> Result<()> {
        self.toggle_consumer(consumer_id, false).await
    }

    pub async fn resume_consumer(&self, consumer_id: &ConsumerId) -> Result<()> {
        self.toggle_consumer(consumer_id, true).await
    }

    async fn toggle_consumer(&self, consumer_id: &ConsumerId, resumed: bool) -> Result<()> {
        let room_id = self
            .consumers
            .get(consumer_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| SfuError::ConsumerNotFound(consumer_id.clone()))?;
        let state = self
            .room(&room_id)?
            .set_consumer_state(consumer_id, resumed)
            .await?;
        debug!(consumer_id = %consumer_id, state = ?state, "Consumer state set");
        Ok(())
    }

    /// The room's live teacher producer, if any.
    pub async fn teacher_producer(&self, room_id: &RoomId) -> Option<(ParticipantId, ProducerId)> {
        let room = self.rooms.get(room_id).map(|r| Arc::clone(r.value()))?;
        room.teacher_producer().await
    }

    fn unindex(&self, owned: &OwnedIds) {
        for transport_id in &owned.transports {
            self.transports.remove(transport_id);
        }
        for consumer_id in &owned.consumers {
            self.consumers.remove(consumer_id);
        }
    }

    // Monitoring getters: read-only, side-effect free.

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn config(&self) -> &SfuConfig {
        &self.config
    }

    /// Watch channel signaling worker death; see
    /// [`WorkerPool::subscribe_death`].
    #[must_use]
    pub fn subscribe_worker_death(&self) -> watch::Receiver<Option<usize>> {
        self.pool.subscribe_death()
    }

    /// Report a worker as dead on behalf of the media engine.
    pub fn report_worker_death(&self, index: usize) {
        self.pool.report_worker_death(index);
    }

    /// Aggregate statistics across all rooms.
    pub async fn stats(&self) -> SfuStats {
        let mut stats = SfuStats {
            workers: self.pool.len(),
            rooms: self.rooms.len(),
            ..SfuStats::default()
        };
        let rooms: Vec<Arc<Room>> = self
            .rooms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for room in rooms {
            let room_stats = room.stats().await;
            stats.participants += room_stats.participants;
            stats.transports += room_stats.transports;
            stats.producers += room_stats.producers;
            stats.consumers += room_stats.consumers;
        }
        stats
    }
}
