//! Room configuration and state machine.

use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room the orchestrator hosts.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Interface the relay listeners bind to.
    pub bind_host: String,

    /// Address advertised to clients for connecting to a room's relays.
    pub host_address: String,

    /// Candidate primary relay ports (end exclusive).
    pub relay_ports: Range<u16>,

    /// Side channel port = primary port + this offset.
    pub side_port_offset: u16,

    /// Random picks tried before giving up on port allocation.
    pub port_attempts: usize,

    /// Upper bound on concurrently live rooms.
    pub max_rooms: usize,

    /// Accept timeout in the waiting phase; connected players are pinged
    /// every time it elapses.
    pub liveness_interval: Duration,

    /// A waiting room with nobody connected for this long is closed.
    pub empty_timeout: Duration,

    /// Pause between "room full" and `gamestart`, so late `init` frames
    /// land first.
    pub start_grace: Duration,

    /// Pause after each `init` frame.
    pub init_settle: Duration,
}

impl RoomConfig {
    /// Side channel port paired with `relay_port`.
    pub fn side_port(&self, relay_port: u16) -> Option<u16> {
        relay_port.checked_add(self.side_port_offset)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            host_address: "127.0.0.1".to_string(),
            relay_ports: 20000..20100,
            side_port_offset: 5000,
            port_attempts: 50,
            max_rooms: 100,
            liveness_interval: Duration::from_secs(1),
            empty_timeout: Duration::from_secs(60),
            start_grace: Duration::from_secs(2),
            init_settle: Duration::from_millis(200),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered, except that a waiting room nobody
/// connects to closes directly:
///
/// ```text
/// Waiting → Starting → Relaying → Closed
///    └──────────────────────────────↗
/// ```
///
/// - **Waiting**: relays are listening; players connect and get a role.
/// - **Starting**: the room is full; participation is recorded and
///   `gamestart` goes out after a short grace.
/// - **Relaying**: every player frame is forwarded to the others.
/// - **Closed**: sockets are closed and the room leaves the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Waiting,
    Starting,
    Relaying,
    Closed,
}

impl RoomState {
    /// Returns `true` if the room still accepts participants.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// The next state in the normal progression.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Starting),
            Self::Starting => Some(Self::Relaying),
            Self::Relaying => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is allowed. Any live state
    /// may close.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Closed && self != Self::Closed)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Starting => write!(f, "Starting"),
            Self::Relaying => write!(f, "Relaying"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
