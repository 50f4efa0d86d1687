use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: little-endian `u32` payload length.
pub const HEADER_SIZE: usize = 4;

/// Largest payload accepted by default: 50 MiB.
pub const MAX_FRAME_BYTES: usize = 50 * 1024 * 1024;

/// One length-prefixed unit of payload.
///
/// Frames carry no identifier or timestamp; order on the stream is the only
/// ordering there is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// What a reader does with a frame whose declared length is out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidFramePolicy {
    /// Drop the header and read the next 4 bytes as the next header.
    ///
    /// There is no resynchronization search: if the length field itself was
    /// corrupt, the stream stays misaligned until the connection is reset.
    #[default]
    Skip,
    /// Treat the invalid length as unrecoverable for this connection.
    Disconnect,
}

impl std::fmt::Display for InvalidFramePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidFramePolicy::Skip => f.write_str("skip"),
            InvalidFramePolicy::Disconnect => f.write_str("disconnect"),
        }
    }
}

/// Check a payload length against `1..=max`.
pub fn validate_len(len: usize, max: usize) -> Result<()> {
    if len == 0 || len > max {
        return Err(FrameError::InvalidLength {
            len: len as u64,
            max,
        });
    }
    Ok(())
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┐
/// │ Length       │ Payload         │
/// │ (4B LE u32)  │ (Length bytes)  │
/// └──────────────┴─────────────────┘
/// ```
///
/// Empty payloads and payloads that do not fit a `u32` length are rejected
/// without touching `dst`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    validate_len(payload.len(), u32::MAX as usize)?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
///
/// A declared length outside `1..=max_frame` consumes the 4 header bytes and
/// returns [`FrameError::InvalidLength`]; the next call starts at the byte
/// that followed the header.
pub fn decode_frame(src: &mut BytesMut, max_frame: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let declared = declared_len(src);
    if declared == 0 || declared > max_frame {
        src.advance(HEADER_SIZE);
        return Err(FrameError::InvalidLength {
            len: declared as u64,
            max: max_frame,
        });
    }

    let total = HEADER_SIZE + declared;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(declared).freeze();

    Ok(Some(Frame { payload }))
}

/// Bytes still missing before `src` holds the next complete header or frame.
///
/// Only meaningful after [`decode_frame`] returned `Ok(None)` for `src`.
pub(crate) fn missing_bytes(src: &[u8]) -> usize {
    if src.len() < HEADER_SIZE {
        return HEADER_SIZE - src.len();
    }
    (HEADER_SIZE + declared_len(src)).saturating_sub(src.len())
}

fn declared_len(src: &[u8]) -> usize {
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    u32::from_le_bytes(header) as usize
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 50 MiB.
    pub max_frame_bytes: usize,
    /// Handling of out-of-bounds lengths on read. Default: skip.
    pub invalid_frame_policy: InvalidFramePolicy,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            invalid_frame_policy: InvalidFramePolicy::Skip,
        }
    }
}
