//! Signaling protocol handler: per-connection sessions, room fan-out,
//! and the WebSocket transport carrying both.

pub mod hub;
pub mod protocol;
pub mod session;
pub mod websocket;
