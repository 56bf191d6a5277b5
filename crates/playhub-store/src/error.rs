//! Error types for the store and its client.

use playhub_protocol::ProtocolError;
use playhub_transport::TransportError;

/// Errors raised by the store engine, its server, and [`StoreClient`](crate::StoreClient).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Writing the snapshot to disk failed.
    #[error("store file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The in-memory state could not be serialized.
    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[source] serde_json::Error),

    /// No record with this id in the collection.
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// The store answered with an error response.
    #[error("store rejected {action}: {message}")]
    Rejected {
        action: &'static str,
        code: Option<u16>,
        message: String,
    },

    /// A successful reply whose `result` has the wrong shape.
    #[error("unexpected store result for {action}: {detail}")]
    UnexpectedResult { action: &'static str, detail: String },

    /// The store closed the connection instead of replying.
    #[error("store connection closed")]
    Disconnected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl StoreError {
    /// Returns `true` if the connection to the store is unusable and should
    /// be re-established before the next request.
    pub fn breaks_connection(&self) -> bool {
        match self {
            Self::Disconnected | Self::Transport(_) => true,
            Self::Protocol(e) => e.is_fatal(),
            _ => false,
        }
    }
}
