//! Length-prefixed framing used on every framerelay hop.
//!
//! Every frame on the wire is:
//! - A 4-byte little-endian payload length
//! - Exactly that many payload bytes
//!
//! No padding, no checksum, no separator between frames. Callers of
//! [`FrameReader`] always receive complete frames; partial reads are
//! accumulated internally.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, validate_len, Frame, FrameConfig, InvalidFramePolicy,
    HEADER_SIZE, MAX_FRAME_BYTES,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, FrameStats};
pub use writer::{write_fully, FrameWriter};
