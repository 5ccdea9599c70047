//! HTTP and signaling surface for the classroom audio SFU
//!
//! Terminates one WebSocket signaling connection per participant,
//! translates requests into [`aula_sfu::SfuManager`] calls under the
//! role/permission rules, and fans room events out to the other
//! participants. Also exposes the out-of-band capability query and the
//! health/stats probes.

pub mod http;
pub mod signaling;
