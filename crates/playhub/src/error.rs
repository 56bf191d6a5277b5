//! Error types for the orchestrator.
//!
//! [`PlayhubError`] is what the server and its binary deal with.
//! [`ActionError`] is what a single client action can fail with; most of
//! its variants become an error response and leave the connection open.

use playhub_protocol::{ProtocolError, Response};
use playhub_room::RoomError;
use playhub_session::SessionError;
use playhub_store::StoreError;
use playhub_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlayhubError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The persistence engine failed or could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A session-level error (auth, presence, role).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, no ports).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Artifact payload storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An action failed in a way that ends the connection.
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Errors from the on-disk artifact payload area.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The name cannot be used as a single path component.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("payload storage failed: {0}")]
    Io(#[from] std::io::Error),

    /// The raw transfer itself broke; the connection is unusable.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Why a client action failed.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The named record does not exist (or was soft-deleted).
    #[error("{0}")]
    NotFound(String),

    /// The caller may not touch this record.
    #[error("{0}")]
    Forbidden(String),

    /// The caller's ownership record is behind the published version.
    #[error("UPDATE_REQUIRED")]
    UpdateRequired { artifact_id: String },

    #[error(transparent)]
    Room(#[from] RoomError),

    /// The request data is well-formed but not acceptable.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A raw transfer failed after its size was announced.
    #[error("raw transfer aborted: {0}")]
    TransferAborted(#[source] TransportError),
}

impl ActionError {
    /// HTTP-style code carried by the error response.
    pub fn code(&self) -> u16 {
        match self {
            Self::Session(SessionError::Backend(_)) => 500,
            Self::Session(SessionError::UsernameTaken(_)) => 409,
            Self::Session(_) => 401,
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::UpdateRequired { .. } => 409,
            Self::Room(RoomError::NotFound(_)) => 404,
            Self::Room(RoomError::InvalidCapacity(_)) => 400,
            Self::Room(_) => 409,
            Self::Invalid(_) => 400,
            Self::Store(StoreError::NotFound { .. }) => 404,
            Self::Store(_) => 500,
            Self::Storage(StorageError::InvalidName(_)) => 400,
            Self::Storage(_) => 500,
            Self::Protocol(_) | Self::Transport(_) | Self::TransferAborted(_) => 500,
        }
    }

    /// Returns `true` if the connection can no longer carry frames, so no
    /// response can be sent.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_recoverable(),
            Self::Storage(StorageError::Transport(e)) => !e.is_recoverable(),
            Self::Protocol(e) => e.is_fatal(),
            Self::TransferAborted(_) => true,
            _ => false,
        }
    }

    /// The error response for this failure.
    pub fn to_response(&self) -> Response {
        match self {
            Self::UpdateRequired { artifact_id } => Response::update_required(artifact_id.clone()),
            other => Response::error(other.code(), other.to_string()),
        }
    }
}
