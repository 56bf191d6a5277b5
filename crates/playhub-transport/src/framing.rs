//! Length-prefixed framing.
//!
//! Wire format of a control frame:
//!
//! ```text
//! ┌────────────────────┬──────────────────────┐
//! │ Length (4B, BE u32) │ Body (Length bytes)  │
//! └────────────────────┴──────────────────────┘
//! ```
//!
//! The body is opaque here; the protocol crate decides what it means.
//! Raw transfers have no header at all, so [`FrameDecoder`] can hand any
//! bytes it has buffered past a frame boundary back to the caller.

use crate::TransportError;

/// Size of the length prefix.
pub const HEADER_SIZE: usize = 4;

/// Maximum allowed frame body (16 MiB). Guards against allocating whatever
/// a corrupted or hostile length prefix asks for.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Upper bound on a single raw-transfer I/O call.
pub const RAW_CHUNK_SIZE: usize = 4096;

/// Encodes `body` as one frame: header followed by the body, in a single
/// buffer so it can be written with one `write_all`.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, TransportError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Incremental frame reassembly.
///
/// Socket reads land here in whatever sizes the kernel delivers; complete
/// frames come out of [`next_frame`](Self::next_frame) in order, and a
/// frame is never returned until every byte of it has arrived.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes read from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pops the next complete frame body, or `Ok(None)` if more bytes are
    /// needed.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let header = [self.buf[0], self.buf[1], self.buf[2], self.buf[3]];
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }
        let total = HEADER_SIZE + len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let body = self.buf[HEADER_SIZE..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(body))
    }

    /// Removes up to `max` buffered bytes without interpreting them.
    ///
    /// Used when switching to a raw transfer: bytes that arrived together
    /// with the announcing frame belong to the transfer.
    pub fn take_buffered(&mut self, max: usize) -> Vec<u8> {
        let n = self.buf.len().min(max);
        self.buf.drain(..n).collect()
    }

    /// Number of buffered bytes not yet returned.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing is buffered (the stream sits on a frame
    /// boundary).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_writes_big_endian_length() {
        let frame = encode_frame(b"abc").unwrap();
        assert_eq!(frame, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_encode_empty_body() {
        let frame = encode_frame(b"").unwrap();
        assert_eq!(frame, vec![0, 0, 0, 0]);

        let mut dec = FrameDecoder::new();
        dec.extend(&frame);
        assert_eq!(dec.next_frame().unwrap(), Some(Vec::new()));
        assert!(dec.is_empty());
    }

    #[test]
    fn test_round_trip_multibyte_text() {
        let body = "{\"msg\":\"héllo wörld ✓ 遊戲\"}".as_bytes();
        let mut dec = FrameDecoder::new();
        dec.extend(&encode_frame(body).unwrap());
        assert_eq!(dec.next_frame().unwrap().as_deref(), Some(body));
    }

    #[test]
    fn test_incomplete_header_needs_more() {
        let mut dec = FrameDecoder::new();
        dec.extend(&[0, 0]);
        assert_eq!(dec.next_frame().unwrap(), None);
        assert_eq!(dec.buffered_len(), 2);
    }

    #[test]
    fn test_incomplete_body_needs_more() {
        let frame = encode_frame(b"hello").unwrap();
        let mut dec = FrameDecoder::new();
        dec.extend(&frame[..6]);
        assert_eq!(dec.next_frame().unwrap(), None);
        dec.extend(&frame[6..]);
        assert_eq!(dec.next_frame().unwrap().as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_byte_by_byte_stream_yields_same_frames() {
        let bodies: Vec<&[u8]> = vec![b"first", b"", b"third frame", b"{}"];
        let mut wire = Vec::new();
        for b in &bodies {
            wire.extend(encode_frame(b).unwrap());
        }

        let mut dec = FrameDecoder::new();
        let mut out = Vec::new();
        for byte in &wire {
            dec.extend(std::slice::from_ref(byte));
            while let Some(frame) = dec.next_frame().unwrap() {
                out.push(frame);
            }
        }

        let expected: Vec<Vec<u8>> = bodies.iter().map(|b| b.to_vec()).collect();
        assert_eq!(out, expected);
        assert!(dec.is_empty());
    }

    #[test]
    fn test_uneven_chunks_do_not_merge_frames() {
        let mut wire = Vec::new();
        for i in 0..20u8 {
            wire.extend(encode_frame(&vec![i; i as usize * 7]).unwrap());
        }

        let mut dec = FrameDecoder::new();
        let mut out = Vec::new();
        let mut pos = 0;
        let mut step = 1;
        while pos < wire.len() {
            let end = (pos + step).min(wire.len());
            dec.extend(&wire[pos..end]);
            while let Some(frame) = dec.next_frame().unwrap() {
                out.push(frame);
            }
            pos = end;
            step = step % 13 + 2;
        }

        assert_eq!(out.len(), 20);
        for (i, frame) in out.iter().enumerate() {
            assert_eq!(frame, &vec![i as u8; i * 7]);
        }
    }

    #[test]
    fn test_oversized_header_rejected() {
        let mut dec = FrameDecoder::new();
        dec.extend(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(
            dec.next_frame(),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_take_buffered_returns_bytes_after_frame() {
        let mut wire = encode_frame(b"announce").unwrap();
        wire.extend_from_slice(b"RAWBYTES");

        let mut dec = FrameDecoder::new();
        dec.extend(&wire);
        assert_eq!(dec.next_frame().unwrap().as_deref(), Some(&b"announce"[..]));
        assert_eq!(dec.take_buffered(3), b"RAW".to_vec());
        assert_eq!(dec.take_buffered(100), b"BYTES".to_vec());
        assert!(dec.is_empty());
    }
}
