//! Common identifier and enum types used throughout the SFU

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(nanoid::nanoid!(21))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a room
    RoomId
);
string_id!(
    /// Unique identifier for a participant (its connection id)
    ParticipantId
);
string_id!(
    /// Unique identifier for a transport
    TransportId
);
string_id!(
    /// Unique identifier for a producer
    ProducerId
);
string_id!(
    /// Unique identifier for a consumer
    ConsumerId
);

/// Role a participant joins a room with. Set once at join, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    #[must_use]
    pub const fn is_teacher(self) -> bool {
        matches!(self, Self::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Teacher => write!(f, "teacher"),
            Self::Student => write!(f, "student"),
        }
    }
}

/// Media kind carried by a producer. Only audio is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Direction of a transport relative to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    Send,
    Recv,
}

impl fmt::Display for TransportDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Recv => write!(f, "recv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_from() {
        let id = RoomId::from("classroom-1");
        assert_eq!(id.as_str(), "classroom-1");
        assert_eq!(id.to_string(), "classroom-1");
        assert_eq!(id, RoomId::new(String::from("classroom-1")));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ProducerId::generate(), ProducerId::generate());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Teacher).expect("serialize"),
            "\"teacher\""
        );
        let role: Role = serde_json::from_str("\"student\"").expect("deserialize");
        assert_eq!(role, Role::Student);
    }

    #[test]
    fn test_direction_serde() {
        let d: TransportDirection = serde_json::from_str("\"send\"").expect("deserialize");
        assert_eq!(d, TransportDirection::Send);
    }
}
