//! TCP transport: framed control messages plus the raw transfer sub-mode.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::framing::{FrameDecoder, RAW_CHUNK_SIZE, encode_frame};
use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Read buffer size for control frames.
const READ_CHUNK_SIZE: usize = 8192;

/// A TCP listener producing [`TcpConnection`]s.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new listener to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::debug!(addr, "tcp transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = TcpConnection::from_stream(stream)
            .map_err(TransportError::AcceptFailed)?;
        tracing::debug!(id = %conn.id, peer = %conn.peer, "accepted tcp connection");
        Ok(conn)
    }
}

struct FrameReader {
    half: OwnedReadHalf,
    decoder: FrameDecoder,
}

/// One framed TCP connection.
///
/// Reads and writes are guarded separately, so one task can block in
/// [`recv`](Connection::recv) while others send to the same peer. Every
/// send writes the whole frame while holding the writer lock; concurrent
/// senders never interleave bytes.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<FrameReader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Connects to a remote listener.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        Self::from_stream(stream).map_err(TransportError::ConnectFailed)
    }

    fn from_stream(stream: TcpStream) -> std::io::Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            id: ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            peer,
            reader: Mutex::new(FrameReader {
                half: read_half,
                decoder: FrameDecoder::new(),
            }),
            writer: Mutex::new(write_half),
        })
    }

    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Streams exactly `len` bytes from `src` to the peer, unframed.
    ///
    /// Both ends must already agree on `len`. If `src` runs dry early the
    /// peer is left waiting for bytes that never come, so the error is
    /// fatal to the connection.
    pub async fn send_raw<R>(&self, src: &mut R, len: u64) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut writer = self.writer.lock().await;
        let mut buf = vec![0u8; RAW_CHUNK_SIZE];
        let mut remaining = len;
        while remaining > 0 {
            let want = remaining.min(RAW_CHUNK_SIZE as u64) as usize;
            let n = src
                .read(&mut buf[..want])
                .await
                .map_err(TransportError::SendFailed)?;
            if n == 0 {
                return Err(TransportError::TransferIncomplete {
                    expected: len,
                    transferred: len - remaining,
                });
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(TransportError::SendFailed)?;
            remaining -= n as u64;
        }
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    /// Receives exactly `len` unframed bytes into `dst`.
    ///
    /// Bytes already buffered behind the last frame are consumed first. If
    /// `dst` fails, the rest of the transfer is still read and discarded,
    /// then [`TransportError::SinkFailed`] is returned; the connection stays
    /// on a frame boundary in that case.
    pub async fn recv_raw<W>(&self, dst: &mut W, len: u64) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut reader = self.reader.lock().await;
        let mut sink_error = None;
        let mut remaining = len;

        let buffered = reader
            .decoder
            .take_buffered(usize::try_from(len).unwrap_or(usize::MAX));
        remaining -= buffered.len() as u64;
        write_to_sink(dst, &buffered, &mut sink_error).await;

        let mut buf = vec![0u8; RAW_CHUNK_SIZE];
        while remaining > 0 {
            let want = remaining.min(RAW_CHUNK_SIZE as u64) as usize;
            let n = reader
                .half
                .read(&mut buf[..want])
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                return Err(TransportError::TransferIncomplete {
                    expected: len,
                    transferred: len - remaining,
                });
            }
            remaining -= n as u64;
            write_to_sink(dst, &buf[..n], &mut sink_error).await;
        }

        if sink_error.is_none() {
            if let Err(e) = dst.flush().await {
                sink_error = Some(e);
            }
        }
        match sink_error {
            Some(e) => Err(TransportError::SinkFailed(e)),
            None => Ok(()),
        }
    }
}

/// Writes to the raw-transfer sink until the first failure, then drops
/// everything after it.
async fn write_to_sink<W>(dst: &mut W, data: &[u8], sink_error: &mut Option<std::io::Error>)
where
    W: AsyncWrite + Unpin + Send,
{
    if data.is_empty() || sink_error.is_some() {
        return;
    }
    if let Err(e) = dst.write_all(data).await {
        *sink_error = Some(e);
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let frame = encode_frame(data)?;
        self.writer
            .lock()
            .await
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = reader.decoder.next_frame()? {
                return Ok(Some(frame));
            }
            let n = reader
                .half
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                if reader.decoder.is_empty() {
                    return Ok(None);
                }
                return Err(TransportError::ConnectionClosed(format!(
                    "peer closed with {} bytes of an unfinished frame",
                    reader.decoder.buffered_len()
                )));
            }
            reader.decoder.extend(&chunk[..n]);
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
