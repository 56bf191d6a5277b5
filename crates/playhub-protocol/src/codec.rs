//! Codec trait and helpers for moving messages over a [`Connection`].
//!
//! A codec converts between Rust types and frame bodies. The rest of the
//! system only ever talks JSON, but keeping the seam means the framing and
//! the message types never need to know that.

use playhub_transport::Connection;
use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a frame body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a frame body back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// A zero-length body decodes as an empty object, so a bare header with
/// length 0 is a valid (empty) mapping.
///
/// ```rust
/// use playhub_protocol::{Codec, JsonCodec, Response};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Response::ok_empty()).unwrap();
/// let decoded: Response = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_ok());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        let data = if data.is_empty() { &b"{}"[..] } else { data };
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

/// Encodes `msg` and sends it as one frame.
pub async fn send_message<C, K, T>(conn: &C, codec: &K, msg: &T) -> Result<(), ProtocolError>
where
    C: Connection<Error = playhub_transport::TransportError>,
    K: Codec,
    T: Serialize,
{
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Receives one frame and decodes it.
///
/// `Ok(None)` means the peer closed cleanly. A body that fails to decode is
/// `ProtocolError::Decode`, which callers treat like a disconnect.
pub async fn recv_message<C, K, T>(conn: &C, codec: &K) -> Result<Option<T>, ProtocolError>
where
    C: Connection<Error = playhub_transport::TransportError>,
    K: Codec,
    T: DeserializeOwned,
{
    match conn.recv().await? {
        Some(bytes) => codec.decode(&bytes).map(Some),
        None => Ok(None),
    }
}
