use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::codec::{decode_frame, missing_bytes, Frame, FrameConfig, InvalidFramePolicy};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
/// Upper bound on a single `read` call while filling a large payload.
const MAX_READ_SIZE: usize = 1024 * 1024;

/// Counters kept by a [`FrameReader`] over the life of its stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Valid frames returned to the caller.
    pub frames: u64,
    /// Payload bytes across those frames.
    pub payload_bytes: u64,
    /// Frames dropped for an out-of-bounds length.
    pub rejected: u64,
    /// Bytes of an unfinished frame discarded at end-of-stream.
    pub truncated_bytes: u64,
}

/// Reads complete frames from any `Read` stream.
///
/// Reads exactly what the current frame still needs (header first, then the
/// declared payload) so that no more than one frame is ever held in memory.
/// Short reads are accumulated; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    stats: FrameStats,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            stats: FrameStats::default(),
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Ok(None)` at end-of-stream. A stream that ends inside a frame
    /// also returns `Ok(None)`; the partial bytes are discarded and counted in
    /// [`FrameStats::truncated_bytes`].
    ///
    /// Frames with an out-of-bounds length are handled per the configured
    /// [`InvalidFramePolicy`]: skipped (the call keeps reading) or returned as
    /// [`FrameError::InvalidLength`].
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match decode_frame(&mut self.buf, self.config.max_frame_bytes) {
                Ok(Some(frame)) => {
                    self.stats.frames += 1;
                    self.stats.payload_bytes += frame.len() as u64;
                    return Ok(Some(frame));
                }
                Ok(None) => {}
                Err(FrameError::InvalidLength { len, max }) => {
                    self.stats.rejected += 1;
                    match self.config.invalid_frame_policy {
                        InvalidFramePolicy::Skip => {
                            warn!(len, max, "dropping frame with invalid length");
                            continue;
                        }
                        InvalidFramePolicy::Disconnect => {
                            return Err(FrameError::InvalidLength { len, max });
                        }
                    }
                }
                Err(err) => return Err(err),
            }

            if self.fill()? == 0 {
                if !self.buf.is_empty() {
                    let partial = self.buf.len();
                    warn!(partial, "stream ended inside a frame; discarding partial frame");
                    self.stats.truncated_bytes += partial as u64;
                    self.buf.clear();
                } else {
                    debug!("end of frame stream");
                }
                return Ok(None);
            }
        }
    }

    /// Read whatever the current frame is missing, up to [`MAX_READ_SIZE`].
    ///
    /// Returns the number of bytes appended; `0` means end-of-stream. Only
    /// `Interrupted` is retried; `WouldBlock` and `TimedOut` are returned to
    /// the caller with the partial frame kept in the buffer.
    fn fill(&mut self) -> Result<usize> {
        let want = missing_bytes(&self.buf).clamp(1, MAX_READ_SIZE);
        let start = self.buf.len();
        self.buf.resize(start + want, 0);

        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(FrameError::Io(err));
                }
            }
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
