//! The live room table: creates rooms, seats participants, hands out ports.
//!
//! One lock guards the table and, implicitly, the set of relay ports in
//! use. Picking a port, binding both listeners, and inserting the room all
//! happen while that lock is held, so two rooms can never race onto the
//! same port.

use std::collections::BTreeMap;
use std::sync::Arc;

use playhub_protocol::RoomId;
use playhub_transport::TcpTransport;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::session::spawn_session;
use crate::{RoomConfig, RoomError, RoomState};

/// A room as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub artifact_id: String,
    pub artifact_name: String,
    pub host: String,
    /// Usernames in join order; the host is first.
    pub participants: Vec<String>,
    pub max_participants: u32,
    pub relay_port: u16,
    pub side_port: u16,
    pub host_address: String,
    pub state: RoomState,
}

impl RoomInfo {
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants as usize
    }
}

/// What the orchestrator knows when a consumer asks for a new room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub artifact_id: String,
    pub artifact_name: String,
    pub host: String,
    pub max_participants: u32,
}

/// Lifecycle notifications from room sessions to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The room filled and is about to start; `participants` are the
    /// usernames seated in the table at that moment.
    Started {
        room_id: RoomId,
        artifact_id: String,
        participants: Vec<String>,
    },
    /// The room is gone from the table.
    Closed { room_id: RoomId },
}

/// Receiving end of the room event channel.
pub type RoomEvents = mpsc::UnboundedReceiver<RoomEvent>;

struct Table {
    next_id: u64,
    rooms: BTreeMap<RoomId, RoomInfo>,
}

impl Table {
    fn port_in_use(&self, port: u16) -> bool {
        self.rooms.values().any(|r| r.relay_port == port)
    }
}

/// Shared handle to the room table. Cloning shares the same table.
#[derive(Clone)]
pub struct RoomRegistry {
    table: Arc<Mutex<Table>>,
    config: Arc<RoomConfig>,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomRegistry {
    /// Creates an empty table. Room lifecycle events arrive on the
    /// returned receiver.
    pub fn new(config: RoomConfig) -> (Self, RoomEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            table: Arc::new(Mutex::new(Table {
                next_id: 1,
                rooms: BTreeMap::new(),
            })),
            config: Arc::new(config),
            events,
        };
        (registry, rx)
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with `new.host` as its first participant and starts
    /// its session.
    ///
    /// # Errors
    /// - [`RoomError::TooManyRooms`] if the table is at its limit
    /// - [`RoomError::PortsExhausted`] if no port pair could be bound
    pub async fn create(&self, new: NewRoom) -> Result<RoomInfo, RoomError> {
        if new.max_participants == 0 {
            return Err(RoomError::InvalidCapacity(new.max_participants));
        }

        let mut table = self.table.lock().await;
        if table.rooms.len() >= self.config.max_rooms {
            return Err(RoomError::TooManyRooms {
                max: self.config.max_rooms,
            });
        }

        let (relay_port, side_port, primary, side) = self.bind_relays(&table).await?;

        let room_id = RoomId(table.next_id);
        table.next_id += 1;
        let info = RoomInfo {
            id: room_id,
            artifact_id: new.artifact_id,
            artifact_name: new.artifact_name,
            host: new.host.clone(),
            participants: vec![new.host],
            max_participants: new.max_participants,
            relay_port,
            side_port,
            host_address: self.config.host_address.clone(),
            state: RoomState::Waiting,
        };
        table.rooms.insert(room_id, info.clone());
        drop(table);

        tracing::info!(%room_id, relay_port, side_port, host = %info.host, "room created");
        spawn_session(self.clone(), &info, primary, side);
        Ok(info)
    }

    /// Picks a free relay port at random and binds both listeners.
    async fn bind_relays(
        &self,
        table: &Table,
    ) -> Result<(u16, u16, TcpTransport, TcpTransport), RoomError> {
        let range = self.config.relay_ports.clone();
        if range.is_empty() {
            return Err(RoomError::PortsExhausted);
        }
        for _ in 0..self.config.port_attempts {
            let port = rand::rng().random_range(range.clone());
            if table.port_in_use(port) {
                continue;
            }
            let Some(side_port) = self.config.side_port(port) else {
                continue;
            };
            let host = &self.config.bind_host;
            let primary = match TcpTransport::bind(&format!("{host}:{port}")).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(port, error = %e, "relay port unavailable");
                    continue;
                }
            };
            let side = match TcpTransport::bind(&format!("{host}:{side_port}")).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(port = side_port, error = %e, "side port unavailable");
                    continue;
                }
            };
            return Ok((port, side_port, primary, side));
        }
        tracing::warn!(attempts = self.config.port_attempts, "relay port allocation failed");
        Err(RoomError::PortsExhausted)
    }

    /// Seats `username` in a room. Seating someone already present is a
    /// no-op that returns the room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] or [`RoomError::RoomFull`].
    pub async fn join(&self, room_id: RoomId, username: &str) -> Result<RoomInfo, RoomError> {
        let mut table = self.table.lock().await;
        let room = table
            .rooms
            .get_mut(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        if room.participants.iter().any(|p| p == username) {
            return Ok(room.clone());
        }
        if room.is_full() || !room.state.is_joinable() {
            return Err(RoomError::RoomFull(room_id));
        }
        room.participants.push(username.to_string());
        tracing::info!(%room_id, username, seated = room.participants.len(), "participant joined");
        Ok(room.clone())
    }

    /// Looks up one room.
    pub async fn get(&self, room_id: RoomId) -> Option<RoomInfo> {
        self.table.lock().await.rooms.get(&room_id).cloned()
    }

    /// Every live room, ascending by id.
    pub async fn list(&self) -> Vec<RoomInfo> {
        self.table.lock().await.rooms.values().cloned().collect()
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.table.lock().await.rooms.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub(crate) async fn set_state(&self, room_id: RoomId, state: RoomState) {
        let mut table = self.table.lock().await;
        if let Some(room) = table.rooms.get_mut(&room_id) {
            if room.state.can_transition_to(state) {
                tracing::debug!(%room_id, from = %room.state, to = %state, "room state");
                room.state = state;
            }
        }
    }

    pub(crate) async fn remove(&self, room_id: RoomId) -> Option<RoomInfo> {
        self.table.lock().await.rooms.remove(&room_id)
    }

    pub(crate) fn notify(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }
}
