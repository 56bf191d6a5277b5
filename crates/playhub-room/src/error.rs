//! Error types for the room layer.

use playhub_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never did, or already closed).
    #[error("Room not found")]
    NotFound(RoomId),

    /// Every seat is taken.
    #[error("Room is full")]
    RoomFull(RoomId),

    /// The room table is at its limit.
    #[error("Too many rooms (limit {max})")]
    TooManyRooms { max: usize },

    /// No relay port pair could be bound.
    #[error("No relay ports available")]
    PortsExhausted,

    /// A room must seat at least one participant.
    #[error("invalid participant limit: {0}")]
    InvalidCapacity(u32),
}

impl RoomError {
    /// Returns `true` for errors that mean "try another room".
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::RoomFull(_) | Self::TooManyRooms { .. } | Self::PortsExhausted
        )
    }
}
