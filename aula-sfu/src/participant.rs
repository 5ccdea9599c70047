//! Participants and the media objects they own
//!
//! A participant exclusively owns at most one transport per direction,
//! at most one producer (teacher only) and a set of consumers keyed by
//! the producer they were created from. Everything here is plain owned
//! state mutated under the room lock; teardown cascades top-down.

use crate::rtc::{DtlsParameters, RtpParameters, TransportParameters};
use crate::types::{
    ConsumerId, MediaKind, ParticipantId, ProducerId, Role, TransportDirection, TransportId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Created,
    Connected,
    Closed,
}

/// One secured media connection endpoint.
#[derive(Debug)]
pub struct Transport {
    pub id: TransportId,
    pub direction: TransportDirection,
    pub state: TransportState,
    pub parameters: TransportParameters,
    pub remote_dtls: Option<DtlsParameters>,
}

impl Transport {
    #[must_use]
    pub fn new(direction: TransportDirection, parameters: TransportParameters) -> Self {
        Self {
            id: TransportId::generate(),
            direction,
            state: TransportState::Created,
            parameters,
            remote_dtls: None,
        }
    }

    /// Finalize the handshake with the peer's DTLS parameters.
    pub fn connect(&mut self, remote_dtls: DtlsParameters) {
        self.remote_dtls = Some(remote_dtls);
        self.state = TransportState::Connected;
    }

    pub fn close(&mut self) {
        self.state = TransportState::Closed;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == TransportState::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerState {
    Open,
    Closed,
}

/// One inbound audio stream accepted on a send transport.
#[derive(Debug)]
pub struct Producer {
    pub id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub state: ProducerState,
}

impl Producer {
    #[must_use]
    pub fn new(rtp_parameters: RtpParameters) -> Self {
        Self {
            id: ProducerId::generate(),
            kind: MediaKind::Audio,
            rtp_parameters,
            state: ProducerState::Open,
        }
    }

    pub fn close(&mut self) {
        self.state = ProducerState::Closed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerState {
    Paused,
    Resumed,
    Closed,
}

/// One outbound audio stream forwarded from a producer. Created paused;
/// the client resumes it once its receive path is wired up.
#[derive(Debug)]
pub struct Consumer {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub rtp_parameters: RtpParameters,
    pub state: ConsumerState,
}

impl Consumer {
    #[must_use]
    pub fn new(producer_id: ProducerId, rtp_parameters: RtpParameters) -> Self {
        Self {
            id: ConsumerId::generate(),
            producer_id,
            rtp_parameters,
            state: ConsumerState::Paused,
        }
    }

    pub fn close(&mut self) {
        self.state = ConsumerState::Closed;
    }
}

/// One connected participant and every media object it owns.
#[derive(Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
    pub send_transport: Option<Transport>,
    pub recv_transport: Option<Transport>,
    pub producer: Option<Producer>,
    pub consumers: HashMap<ProducerId, Consumer>,
}

impl Participant {
    #[must_use]
    pub fn new(id: ParticipantId, role: Role) -> Self {
        Self {
            id,
            role,
            send_transport: None,
            recv_transport: None,
            producer: None,
            consumers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn transport(&self, direction: TransportDirection) -> Option<&Transport> {
        match direction {
            TransportDirection::Send => self.send_transport.as_ref(),
            TransportDirection::Recv => self.recv_transport.as_ref(),
        }
    }

    pub fn transport_mut_by_id(&mut self, id: &TransportId) -> Option<&mut Transport> {
        [self.send_transport.as_mut(), self.recv_transport.as_mut()]
            .into_iter()
            .flatten()
            .find(|t| &t.id == id && !t.is_closed())
    }

    pub fn consumer_mut_by_id(&mut self, id: &ConsumerId) -> Option<&mut Consumer> {
        self.consumers
            .values_mut()
            .find(|c| &c.id == id && c.state != ConsumerState::Closed)
    }

    /// Install a transport, closing and replacing any previous one of the
    /// same direction. Closing a send transport cascades to the producer,
    /// closing a recv transport cascades to the consumers riding it.
    /// Every id closed along the way is reported so the orchestrator can
    /// unindex it.
    pub fn install_transport(&mut self, transport: Transport) -> TransportReplaced {
        let direction = transport.direction;
        let slot = match direction {
            TransportDirection::Send => &mut self.send_transport,
            TransportDirection::Recv => &mut self.recv_transport,
        };
        let mut replaced = TransportReplaced::default();
        replaced.transport = slot.replace(transport).map(|mut old| {
            old.close();
            old.id
        });
        if replaced.transport.is_some() {
            match direction {
                TransportDirection::Send => replaced.producer = self.close_producer(),
                TransportDirection::Recv => replaced.consumers = self.close_consumers(),
            }
        }
        replaced
    }

    fn close_producer(&mut self) -> Option<ProducerId> {
        let producer = self
            .producer
            .as_mut()
            .filter(|p| p.state == ProducerState::Open)?;
        producer.close();
        debug!(participant_id = %self.id, producer_id = %producer.id, "Producer closed");
        Some(producer.id.clone())
    }

    fn close_consumers(&mut self) -> Vec<ConsumerId> {
        self.consumers
            .values_mut()
            .filter(|c| c.state != ConsumerState::Closed)
            .map(|consumer| {
                consumer.close();
                consumer.id.clone()
            })
            .collect()
    }

    /// Close the consumer derived from the given producer, if present.
    /// Returns its id for index cleanup.
    pub fn close_consumer_of(&mut self, producer_id: &ProducerId) -> Option<ConsumerId> {
        self.consumers.get_mut(producer_id).map(|consumer| {
            consumer.close();
            consumer.id.clone()
        })
    }

    /// Tear down everything this participant owns: transports first, then
    /// the producer and consumers they carried. Returns the ids that were
    /// indexed at the orchestrator so the caller can unindex them.
    pub fn close_all(&mut self) -> OwnedIds {
        let mut owned = OwnedIds::default();
        for transport in [self.send_transport.as_mut(), self.recv_transport.as_mut()]
            .into_iter()
            .flatten()
        {
            transport.close();
            owned.transports.push(transport.id.clone());
        }
        if let Some(producer) = self.producer.as_mut() {
            producer.close();
            owned.producer = Some(producer.id.clone());
        }
        for consumer in self.consumers.values_mut() {
            consumer.close();
            owned.consumers.push(consumer.id.clone());
        }
        owned
    }

    /// Live (non-closed) object counts, for stats aggregation.
    #[must_use]
    pub fn live_counts(&self) -> (usize, usize, usize) {
        let transports = [self.send_transport.as_ref(), self.recv_transport.as_ref()]
            .into_iter()
            .flatten()
            .filter(|t| !t.is_closed())
            .count();
        let producers = usize::from(
            self.producer
                .as_ref()
                .is_some_and(|p| p.state == ProducerState::Open),
        );
        let consumers = self
            .consumers
            .values()
            .filter(|c| c.state != ConsumerState::Closed)
            .count();
        (transports, producers, consumers)
    }
}

/// Ids released by a participant teardown.
#[derive(Debug, Default)]
pub struct OwnedIds {
    pub transports: Vec<TransportId>,
    pub producer: Option<ProducerId>,
    pub consumers: Vec<ConsumerId>,
}

/// Ids closed by installing a transport over an existing one.
#[derive(Debug, Default)]
pub struct TransportReplaced {
    pub transport: Option<TransportId>,
    pub producer: Option<ProducerId>,
    pub consumers: Vec<ConsumerId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SfuConfig;
    use crate::rtc::RtcParameterFactory;

    fn transport(direction: TransportDirection) -> Transport {
        let factory = RtcParameterFactory::new(&SfuConfig::default());
        Transport::new(direction, factory.transport_parameters())
    }

    #[test]
    fn test_transport_lifecycle() {
        let mut t = transport(TransportDirection::Send);
        assert_eq!(t.state, TransportState::Created);
        t.connect(t.parameters.dtls_parameters.clone());
        assert_eq!(t.state, TransportState::Connected);
        t.close();
        assert!(t.is_closed());
    }

    #[test]
    fn test_install_replaces_same_direction() {
        let mut p = Participant::new(ParticipantId::from("t1"), Role::Teacher);
        assert!(p
            .install_transport(transport(TransportDirection::Send))
            .transport
            .is_none());
        let first_id = p.send_transport.as_ref().map(|t| t.id.clone());
        let replaced = p.install_transport(transport(TransportDirection::Send));
        assert_eq!(replaced.transport, first_id);
        // the new transport is live
        assert_eq!(
            p.send_transport.as_ref().map(|t| t.state),
            Some(TransportState::Created)
        );
    }

    #[test]
    fn test_recv_replacement_reports_closed_consumers() {
        let mut p = Participant::new(ParticipantId::from("s1"), Role::Student);
        p.install_transport(transport(TransportDirection::Recv));
        let producer_id = ProducerId::generate();
        let consumer = Consumer::new(producer_id.clone(), RtpParameters::default());
        let consumer_id = consumer.id.clone();
        p.consumers.insert(producer_id, consumer);

        let replaced = p.install_transport(transport(TransportDirection::Recv));
        assert_eq!(replaced.consumers, vec![consumer_id]);
        assert_eq!(p.live_counts(), (1, 0, 0));
    }

    #[test]
    fn test_send_replacement_reports_closed_producer() {
        let mut p = Participant::new(ParticipantId::from("t1"), Role::Teacher);
        p.install_transport(transport(TransportDirection::Send));
        p.producer = Some(Producer::new(RtpParameters::default()));
        let producer_id = p.producer.as_ref().map(|pr| pr.id.clone());

        let replaced = p.install_transport(transport(TransportDirection::Send));
        assert_eq!(replaced.producer, producer_id);
        // replacing again reports nothing: the producer is already closed
        let replaced = p.install_transport(transport(TransportDirection::Send));
        assert_eq!(replaced.producer, None);
    }

    #[test]
    fn test_close_all_cascades() {
        let mut p = Participant::new(ParticipantId::from("t1"), Role::Teacher);
        p.install_transport(transport(TransportDirection::Send));
        p.producer = Some(Producer::new(RtpParameters::default()));
        let producer_id = p.producer.as_ref().map(|pr| pr.id.clone()).expect("producer");
        p.consumers.insert(
            producer_id.clone(),
            Consumer::new(producer_id, RtpParameters::default()),
        );

        let owned = p.close_all();
        assert_eq!(owned.transports.len(), 1);
        assert!(owned.producer.is_some());
        assert_eq!(owned.consumers.len(), 1);
        assert_eq!(p.live_counts(), (0, 0, 0));
    }

    #[test]
    fn test_consumer_starts_paused() {
        let c = Consumer::new(ProducerId::generate(), RtpParameters::default());
        assert_eq!(c.state, ConsumerState::Paused);
    }
}
