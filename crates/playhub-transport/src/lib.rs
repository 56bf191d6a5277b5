//! Transport layer for playhub.
//!
//! Provides the [`Transport`] and [`Connection`] traits plus their TCP
//! implementation. A connection carries two kinds of traffic, never mixed
//! mid-frame:
//!
//! - **Control frames**: 4-byte big-endian length, then the body
//!   ([`framing`]).
//! - **Raw transfers**: exactly `N` unframed bytes, announced beforehand by
//!   a control frame ([`TcpConnection::send_raw`] / [`TcpConnection::recv_raw`]).
//!
//! Every failure is a [`TransportError`] and means the connection is gone.

#![allow(async_fn_in_trait)]

mod error;
pub mod framing;
mod tcp;

pub use error::TransportError;
pub use framing::{FrameDecoder, encode_frame};
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that exchanges framed messages.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame body to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame body from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closes on a frame boundary.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the sending side of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
