//! Negotiated-parameter descriptors for the media transport boundary
//!
//! The ICE/DTLS handshake and SRTP packet machinery live in the
//! underlying media engine; this module only models the descriptors
//! exchanged with clients (router capabilities, transport connection
//! parameters, RTP parameters) and issues placeholder values for them.

use crate::config::SfuConfig;
use crate::types::MediaKind;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU16, Ordering};

const HEX: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F',
];

/// Audio codec descriptor advertised by a router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecCapability {
    pub mime_type: String,
    pub kind: MediaKind,
    pub clock_rate: u32,
    pub channels: u8,
    pub payload_type: u8,
}

impl CodecCapability {
    /// The one codec this SFU negotiates: Opus, 48 kHz stereo.
    #[must_use]
    pub fn opus() -> Self {
        Self {
            mime_type: "audio/opus".to_string(),
            kind: MediaKind::Audio,
            clock_rate: 48000,
            channels: 2,
            payload_type: 100,
        }
    }
}

/// Codec/capability descriptor negotiated per room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterCapabilities {
    pub codecs: Vec<CodecCapability>,
}

impl RouterCapabilities {
    #[must_use]
    pub fn audio_only() -> Self {
        Self {
            codecs: vec![CodecCapability::opus()],
        }
    }
}

/// Client-side capability declaration supplied on `consume`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<CodecCapability>,
}

/// RTP stream parameters supplied on `produce` and returned on `consume`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RtpParameters {
    #[serde(default)]
    pub codecs: Vec<CodecCapability>,
    #[serde(default)]
    pub ssrc: u32,
}

/// ICE credentials for one transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceParameters {
    pub username_fragment: String,
    pub password: String,
}

/// One ICE candidate announced to the remote peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidate {
    pub foundation: String,
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    pub candidate_type: String,
}

/// DTLS fingerprint (algorithm + colon-separated hex digest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    pub algorithm: String,
    pub value: String,
}

/// DTLS parameters for one side of a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtlsParameters {
    pub role: String,
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// Full connection-parameter bundle relayed to the remote peer after
/// `create-transport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportParameters {
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
}

/// Issues placeholder ICE/DTLS parameters for new transports.
///
/// Ports are handed out sequentially from the configured range, wrapping
/// around on exhaustion; the engine behind the boundary owns the real
/// sockets.
#[derive(Debug)]
pub struct RtcParameterFactory {
    announced_ip: String,
    min_port: u16,
    max_port: u16,
    next_port: AtomicU16,
}

impl RtcParameterFactory {
    #[must_use]
    pub fn new(config: &SfuConfig) -> Self {
        Self {
            announced_ip: config.announced_ip.clone(),
            min_port: config.rtc_min_port,
            max_port: config.rtc_max_port,
            next_port: AtomicU16::new(0),
        }
    }

    fn allocate_port(&self) -> u16 {
        let span = u32::from(self.max_port - self.min_port) + 1;
        let offset = u32::from(self.next_port.fetch_add(1, Ordering::Relaxed)) % span;
        self.min_port + offset as u16
    }

    fn fingerprint_digest() -> String {
        let raw = nanoid::nanoid!(64, &HEX);
        raw.as_bytes()
            .chunks(2)
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Build the connection parameters for a freshly created transport.
    #[must_use]
    pub fn transport_parameters(&self) -> TransportParameters {
        let port = self.allocate_port();
        TransportParameters {
            ice_parameters: IceParameters {
                username_fragment: nanoid::nanoid!(8),
                password: nanoid::nanoid!(24),
            },
            ice_candidates: vec![IceCandidate {
                foundation: "udpcandidate".to_string(),
                ip: self.announced_ip.clone(),
                port,
                protocol: "udp".to_string(),
                candidate_type: "host".to_string(),
            }],
            dtls_parameters: DtlsParameters {
                role: "auto".to_string(),
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: Self::fingerprint_digest(),
                }],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> RtcParameterFactory {
        RtcParameterFactory::new(&SfuConfig {
            announced_ip: "192.0.2.10".to_string(),
            rtc_min_port: 40000,
            rtc_max_port: 40002,
            ..SfuConfig::default()
        })
    }

    #[test]
    fn test_ports_stay_in_range_and_wrap() {
        let factory = factory();
        let ports: Vec<u16> = (0..5)
            .map(|_| factory.transport_parameters().ice_candidates[0].port)
            .collect();
        assert_eq!(ports, vec![40000, 40001, 40002, 40000, 40001]);
    }

    #[test]
    fn test_fingerprint_shape() {
        let params = factory().transport_parameters();
        let fp = &params.dtls_parameters.fingerprints[0].value;
        // 32 colon-separated hex byte pairs
        assert_eq!(fp.split(':').count(), 32);
        assert!(fp
            .chars()
            .all(|c| c == ':' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_router_capabilities_audio_only() {
        let caps = RouterCapabilities::audio_only();
        assert_eq!(caps.codecs.len(), 1);
        assert_eq!(caps.codecs[0].mime_type, "audio/opus");
        assert_eq!(caps.codecs[0].kind, MediaKind::Audio);
    }
}
