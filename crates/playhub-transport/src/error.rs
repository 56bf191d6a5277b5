/// Errors that can occur in the transport layer.
///
/// Every variant means the same thing to callers: the connection is no
/// longer usable and must be dropped. The variants only exist so logs say
/// what happened.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a remote listener failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// A frame header announced more bytes than the limit allows.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    /// The peer stopped before the announced raw byte count was reached.
    #[error("raw transfer ended after {transferred} of {expected} bytes")]
    TransferIncomplete { expected: u64, transferred: u64 },

    /// The local destination of a raw transfer failed. The announced bytes
    /// were still consumed, so the connection remains in sync.
    #[error("raw transfer sink failed: {0}")]
    SinkFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the connection can keep exchanging frames after
    /// this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SinkFailed(_))
    }
}
