//! Error types for the protocol layer.

use playhub_transport::TransportError;

/// Errors that can occur while turning frames into messages and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame body is not a decodable message.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The request names an action this side does not implement.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The message decodes but its fields are wrong for its action.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Returns `true` if the connection must be dropped: the stream itself
    /// failed or carried something that is not a message at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }
}
