//! Room identifiers and the notices a room session sends to its players.
//!
//! Traffic between players is free-form: the server only looks at the
//! `type` field, to drop `ping` frames from the relay. Everything else is
//! forwarded untouched.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::de::number_or_string;

/// A unique identifier for a live room.
///
/// Serialized as a bare number. Clients may also send it as a numeric
/// string (`"4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        number_or_string(deserializer).map(RoomId)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Frames the room session itself originates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RoomNotice {
    /// Sent to each player on arrival, announcing their role token.
    Init { role: String, msg: String },
    /// Sent to everyone once the room is full.
    GameStart { msg: String },
    /// Liveness probe. Never relayed.
    Ping,
    /// Terminal notice; the room is going away.
    Error { msg: String },
}

impl RoomNotice {
    /// The notice sent to every player still connected when a room closes.
    pub fn room_closed() -> Self {
        Self::Error {
            msg: "Room closed.".into(),
        }
    }
}

/// Returns the `type` tag of a room-traffic frame body, if it has one.
pub fn frame_type(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Tagged {
        #[serde(rename = "type")]
        kind: Option<Value>,
    }

    let tagged: Tagged = serde_json::from_slice(body).ok()?;
    match tagged.kind? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Returns `true` for a liveness probe, which the relay must swallow.
pub fn is_ping(body: &[u8]) -> bool {
    frame_type(body).as_deref() == Some("ping")
}
