/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared length is zero or exceeds the configured maximum.
    ///
    /// When returned while decoding, the 4-byte header has already been
    /// consumed from the stream.
    #[error("invalid frame length {len} (must be 1..={max})")]
    InvalidLength { len: u64, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stopped accepting bytes before a complete frame was written.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
