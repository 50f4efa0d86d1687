use std::io::{ErrorKind, Write};

use crate::codec::{validate_len, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Write all of `bytes` to `sink` through repeated partial writes.
///
/// Only `Interrupted` is retried. `WouldBlock` and `TimedOut` (a socket send
/// timeout expiring) are errors like any other. A sink that accepts zero
/// bytes is reported as [`FrameError::ConnectionClosed`].
pub fn write_fully<W: Write + ?Sized>(sink: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match sink.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out as two writes, header then payload, and a started
/// frame is always completed unless the sink fails.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.payload.as_ref())
    }

    /// Frame and send a payload.
    ///
    /// Lengths outside `1..=max_frame_bytes` are rejected before anything is
    /// written.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        validate_len(payload.len(), self.config.max_frame_bytes.min(u32::MAX as usize))?;

        let header: [u8; HEADER_SIZE] = (payload.len() as u32).to_le_bytes();
        write_fully(&mut self.inner, &header)?;
        write_fully(&mut self.inner, payload)?;

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
