//! In-memory hub routing server messages to connected participants
//!
//! Single-node message distribution: each connected participant
//! registers the sender half of its outbound channel under its room;
//! broadcasts fan out to every subscriber except the originator. Dead
//! senders are pruned on the next broadcast that hits them.

use crate::signaling::protocol::ServerMessage;
use aula_sfu::{ParticipantId, RoomId};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

struct Subscriber {
    participant_id: ParticipantId,
    sender: MessageSender,
}

#[derive(Default)]
pub struct RoomMessageHub {
    /// room -> subscribers
    rooms: DashMap<RoomId, Vec<Subscriber>>,
    /// participant -> room, for cleanup and direct sends
    connections: DashMap<ParticipantId, RoomId>,
}

impl RoomMessageHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant's outbound sender under a room.
    pub fn subscribe(&self, room_id: RoomId, participant_id: ParticipantId, sender: MessageSender) {
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .push(Subscriber {
                participant_id: participant_id.clone(),
                sender,
            });
        self.connections.insert(participant_id.clone(), room_id.clone());
        debug!(
            room_id = %room_id,
            participant_id = %participant_id,
            "Participant subscribed to room events"
        );
    }

    pub fn unsubscribe(&self, participant_id: &ParticipantId) {
        if let Some((_, room_id)) = self.connections.remove(participant_id) {
            if let Some(mut subscribers) = self.rooms.get_mut(&room_id) {
                subscribers.retain(|s| &s.participant_id != participant_id);
                if subscribers.is_empty() {
                    drop(subscribers);
                    self.rooms.remove(&room_id);
                }
            }
            debug!(
                room_id = %room_id,
                participant_id = %participant_id,
                "Participant unsubscribed from room events"
            );
        }
    }

    /// Broadcast to every participant in the room except the sender.
    /// Returns the number of participants reached.
    pub fn broadcast_except(
        &self,
        room_id: &RoomId,
        except: &ParticipantId,
        message: &ServerMessage,
    ) -> usize {
        let mut sent = 0;
        let mut dead = Vec::new();
        if let Some(subscribers) = self.rooms.get(room_id) {
            for subscriber in subscribers.iter() {
                if &subscriber.participant_id == except {
                    continue;
                }
                if subscriber.sender.send(message.clone()).is_ok() {
                    sent += 1;
                } else {
                    dead.push(subscriber.participant_id.clone());
                }
            }
        }
        for participant_id in dead {
            warn!(
                room_id = %room_id,
                participant_id = %participant_id,
                "Dropping dead subscriber"
            );
            self.unsubscribe(&participant_id);
        }
        sent
    }

    /// Send a message directly to one participant. Returns false when the
    /// participant is not connected (or its channel is closed).
    pub fn send_to(&self, participant_id: &ParticipantId, message: ServerMessage) -> bool {
        let Some(room_id) = self.connections.get(participant_id).map(|r| r.value().clone())
        else {
            return false;
        };
        let Some(subscribers) = self.rooms.get(&room_id) else {
            return false;
        };
        subscribers
            .iter()
            .find(|s| &s.participant_id == participant_id)
            .is_some_and(|s| s.sender.send(message).is_ok())
    }

    #[must_use]
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, |s| s.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (MessageSender, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let hub = RoomMessageHub::new();
        let room = RoomId::from("r1");
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        hub.subscribe(room.clone(), ParticipantId::from("a"), tx_a);
        hub.subscribe(room.clone(), ParticipantId::from("b"), tx_b);

        let sent = hub.broadcast_except(&room, &ParticipantId::from("a"), &ServerMessage::TeacherLeft);
        assert_eq!(sent, 1);
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::TeacherLeft)));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_direct_send() {
        let hub = RoomMessageHub::new();
        let (tx, mut rx) = channel();
        hub.subscribe(RoomId::from("r1"), ParticipantId::from("a"), tx);

        assert!(hub.send_to(
            &ParticipantId::from("a"),
            ServerMessage::TeacherMuted { muted: true }
        ));
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::TeacherMuted { muted: true })
        ));
        assert!(!hub.send_to(&ParticipantId::from("ghost"), ServerMessage::TeacherLeft));
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_empty_room() {
        let hub = RoomMessageHub::new();
        let (tx, _rx) = channel();
        hub.subscribe(RoomId::from("r1"), ParticipantId::from("a"), tx);
        assert_eq!(hub.subscriber_count(&RoomId::from("r1")), 1);
        hub.unsubscribe(&ParticipantId::from("a"));
        assert_eq!(hub.subscriber_count(&RoomId::from("r1")), 0);
    }

    #[tokio::test]
    async fn test_dead_subscriber_pruned_on_broadcast() {
        let hub = RoomMessageHub::new();
        let room = RoomId::from("r1");
        let (tx_a, rx_a) = channel();
        let (tx_b, mut _rx_b) = channel();
        hub.subscribe(room.clone(), ParticipantId::from("a"), tx_a);
        hub.subscribe(room.clone(), ParticipantId::from("b"), tx_b);
        drop(rx_a);

        let sent = hub.broadcast_except(&room, &ParticipantId::from("b"), &ServerMessage::TeacherLeft);
        assert_eq!(sent, 0);
        assert_eq!(hub.subscriber_count(&room), 1);
    }
}
