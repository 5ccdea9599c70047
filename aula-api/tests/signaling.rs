//! End-to-end signaling scenarios driven through real sessions
//!
//! Each test wires sessions straight to in-memory channels, so every
//! reply and broadcast is observable deterministically: a session call
//! returns only after its reply (and any broadcasts) have been queued.

use aula_api::http::AppState;
use aula_api::signaling::protocol::ServerMessage;
use aula_api::signaling::session::Session;
use aula_sfu::{ParticipantId, SfuConfig, SfuManager};
use tokio::sync::mpsc;

struct TestClient {
    session: Session,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestClient {
    fn connect(state: &AppState, id: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(
            ParticipantId::from(id),
            state.sfu.clone(),
            state.hub.clone(),
            tx,
        );
        Self { session, rx }
    }

    /// Send one frame and drain everything queued on this client.
    async fn request(&mut self, frame: &str) -> Vec<ServerMessage> {
        self.session.handle_frame(frame).await;
        self.drain()
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    async fn disconnect(&mut self) {
        self.session.disconnect().await;
    }
}

fn state() -> AppState {
    let sfu = SfuManager::new(SfuConfig {
        num_workers: 1,
        ..SfuConfig::default()
    })
    .expect("manager");
    AppState::new(sfu)
}

fn reply_data(messages: &[ServerMessage]) -> serde_json::Value {
    messages
        .iter()
        .find_map(|m| match m {
            ServerMessage::Reply { data, .. } => Some(data.clone()),
            _ => None,
        })
        .expect("expected a reply")
}

fn error_kind(messages: &[ServerMessage]) -> String {
    messages
        .iter()
        .find_map(|m| match m {
            ServerMessage::Error { kind, .. } => Some(kind.clone()),
            _ => None,
        })
        .expect("expected an error")
}

fn field(value: &serde_json::Value, key: &str) -> String {
    value[key].as_str().expect("string field").to_string()
}

/// Teacher produces, student joins and consumes, resume acknowledges.
#[tokio::test]
async fn round_trip_teacher_to_student() {
    let state = state();
    let mut teacher = TestClient::connect(&state, "teacher-1");
    let mut student = TestClient::connect(&state, "student-1");

    let joined = teacher
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"teacher"}"#)
        .await;
    let join_reply = reply_data(&joined);
    assert_eq!(field(&join_reply, "roomId"), "R1");

    // Student joins before the teacher produces.
    student
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"student"}"#)
        .await;
    // Teacher sees the join.
    assert!(teacher
        .drain()
        .iter()
        .any(|m| matches!(m, ServerMessage::ParticipantJoined { .. })));

    // Teacher wires up its send transport and produces.
    let created = teacher
        .request(r#"{"id":2,"type":"create-transport","direction":"send"}"#)
        .await;
    let transport_id = field(&reply_data(&created), "transportId");
    let connect = format!(
        r#"{{"id":3,"type":"connect-transport","transportId":"{transport_id}","dtlsParameters":{{"role":"client","fingerprints":[]}}}}"#
    );
    teacher.request(&connect).await;
    let produce = format!(
        r#"{{"id":4,"type":"produce","transportId":"{transport_id}","kind":"audio","rtpParameters":{{"ssrc":1111}}}}"#
    );
    let produced = teacher.request(&produce).await;
    let producer_id = field(&reply_data(&produced), "producerId");

    // Student is notified of the new producer.
    let events = student.drain();
    assert!(events.iter().any(|m| matches!(
        m,
        ServerMessage::NewProducer { producer_id: p } if p.as_str() == producer_id
    )));

    // Student consumes over its receive transport; consumer starts paused.
    let created = student
        .request(r#"{"id":2,"type":"create-transport","direction":"recv"}"#)
        .await;
    let recv_id = field(&reply_data(&created), "transportId");
    let consume = format!(
        r#"{{"id":3,"type":"consume","transportId":"{recv_id}","producerId":"{producer_id}"}}"#
    );
    let consumed = student.request(&consume).await;
    let consumed = reply_data(&consumed);
    assert_eq!(field(&consumed, "state"), "paused");
    let consumer_id = field(&consumed, "consumerId");

    let resume = format!(r#"{{"id":4,"type":"resume-consumer","consumerId":"{consumer_id}"}}"#);
    let resumed = student.request(&resume).await;
    reply_data(&resumed); // ack, not an error
}

/// A student joining after the producer exists gets a direct
/// teacher-audio-available instead of waiting for a broadcast.
#[tokio::test]
async fn late_joining_student_learns_of_live_producer() {
    let state = state();
    let mut teacher = TestClient::connect(&state, "teacher-1");

    teacher
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"teacher"}"#)
        .await;
    let created = teacher
        .request(r#"{"id":2,"type":"create-transport","direction":"send"}"#)
        .await;
    let transport_id = field(&reply_data(&created), "transportId");
    let produce = format!(
        r#"{{"id":3,"type":"produce","transportId":"{transport_id}","kind":"audio","rtpParameters":{{}}}}"#
    );
    let produced = teacher.request(&produce).await;
    let producer_id = field(&reply_data(&produced), "producerId");

    let mut student = TestClient::connect(&state, "student-1");
    let joined = student
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"student"}"#)
        .await;
    assert!(joined.iter().any(|m| matches!(
        m,
        ServerMessage::TeacherAudioAvailable { producer_id: p } if p.as_str() == producer_id
    )));
}

/// Teacher disconnect: student sees participant-left and teacher-left,
/// and the producer is no longer consumable.
#[tokio::test]
async fn teardown_on_teacher_disconnect() {
    let state = state();
    let mut teacher = TestClient::connect(&state, "teacher-1");
    let mut student = TestClient::connect(&state, "student-1");

    teacher
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"teacher"}"#)
        .await;
    student
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"student"}"#)
        .await;
    let created = teacher
        .request(r#"{"id":2,"type":"create-transport","direction":"send"}"#)
        .await;
    let transport_id = field(&reply_data(&created), "transportId");
    let produce = format!(
        r#"{{"id":3,"type":"produce","transportId":"{transport_id}","kind":"audio","rtpParameters":{{}}}}"#
    );
    let produced = teacher.request(&produce).await;
    let producer_id = field(&reply_data(&produced), "producerId");
    student.drain();

    teacher.disconnect().await;

    let events = student.drain();
    assert!(events
        .iter()
        .any(|m| matches!(m, ServerMessage::ParticipantLeft { .. })));
    assert!(events.iter().any(|m| matches!(m, ServerMessage::TeacherLeft)));

    // The room's teacher reference is gone.
    assert!(state
        .sfu
        .teacher_producer(&aula_sfu::RoomId::from("R1"))
        .await
        .is_none());

    // Consuming the dead producer now fails.
    let created = student
        .request(r#"{"id":2,"type":"create-transport","direction":"recv"}"#)
        .await;
    let recv_id = field(&reply_data(&created), "transportId");
    let consume = format!(
        r#"{{"id":3,"type":"consume","transportId":"{recv_id}","producerId":"{producer_id}"}}"#
    );
    let failed = student.request(&consume).await;
    assert_eq!(error_kind(&failed), "producer-not-found");
}

/// Students can neither open a send transport nor produce, and the
/// rejection leaves no state behind.
#[tokio::test]
async fn permission_enforcement_for_students() {
    let state = state();
    let mut student = TestClient::connect(&state, "student-1");
    student
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"student"}"#)
        .await;

    let denied = student
        .request(r#"{"id":2,"type":"create-transport","direction":"send"}"#)
        .await;
    assert_eq!(error_kind(&denied), "permission-denied");

    let denied = student
        .request(
            r#"{"id":3,"type":"produce","transportId":"t","kind":"audio","rtpParameters":{}}"#,
        )
        .await;
    assert_eq!(error_kind(&denied), "permission-denied");

    let stats = state.sfu.stats().await;
    assert_eq!(stats.transports, 0);
    assert_eq!(stats.producers, 0);
}

/// Only audio is forwarded; a video produce is rejected even for the teacher.
#[tokio::test]
async fn video_produce_rejected() {
    let state = state();
    let mut teacher = TestClient::connect(&state, "teacher-1");
    teacher
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"teacher"}"#)
        .await;
    let created = teacher
        .request(r#"{"id":2,"type":"create-transport","direction":"send"}"#)
        .await;
    let transport_id = field(&reply_data(&created), "transportId");

    let produce = format!(
        r#"{{"id":3,"type":"produce","transportId":"{transport_id}","kind":"video","rtpParameters":{{}}}}"#
    );
    let rejected = teacher.request(&produce).await;
    assert_eq!(error_kind(&rejected), "unsupported-media-kind");
}

/// Mute toggles are informational broadcasts with no media-state change.
#[tokio::test]
async fn teacher_mute_broadcast() {
    let state = state();
    let mut teacher = TestClient::connect(&state, "teacher-1");
    let mut student = TestClient::connect(&state, "student-1");
    teacher
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"teacher"}"#)
        .await;
    student
        .request(r#"{"id":1,"type":"join-room","roomId":"R1","role":"student"}"#)
        .await;
    teacher.drain();

    teacher.request(r#"{"id":2,"type":"teacher-mute"}"#).await;
    assert!(student
        .drain()
        .iter()
        .any(|m| matches!(m, ServerMessage::TeacherMuted { muted: true })));

    // Students cannot impersonate the mute control.
    let denied = student.request(r#"{"id":2,"type":"teacher-mute"}"#).await;
    assert_eq!(error_kind(&denied), "permission-denied");
}

/// Requests before join and malformed frames get structured errors.
#[tokio::test]
async fn protocol_level_rejections() {
    let state = state();
    let mut client = TestClient::connect(&state, "c1");

    let rejected = client
        .request(r#"{"id":1,"type":"create-transport","direction":"recv"}"#)
        .await;
    assert_eq!(error_kind(&rejected), "bad-request");

    let rejected = client.request("not json").await;
    assert_eq!(error_kind(&rejected), "bad-request");

    // Capabilities work without a join when a room id is supplied.
    let caps = client
        .request(r#"{"id":2,"type":"get-router-capabilities","roomId":"R9"}"#)
        .await;
    assert_eq!(field(&reply_data(&caps), "roomId"), "R9");

    // Joining twice on one connection is rejected.
    client
        .request(r#"{"id":3,"type":"join-room","roomId":"R1","role":"student"}"#)
        .await;
    let rejected = client
        .request(r#"{"id":4,"type":"join-room","roomId":"R2","role":"student"}"#)
        .await;
    assert_eq!(error_kind(&rejected), "bad-request");
}
