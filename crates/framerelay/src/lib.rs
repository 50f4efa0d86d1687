//! Relay length-prefixed frames from a producer into a transcoder.
//!
//! A producer writes frames (4-byte little-endian length, then payload) to a
//! relay client. The client forwards every valid frame over a named channel
//! to a bridge, which strips the headers and streams the payloads into the
//! stdin of a supervised transcoder such as ffmpeg.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket channel with one-shot accept
//! - [`frame`]: Length-prefixed framing, blocking reader and writer
//! - [`relay`]: Relay client, bridge, and transcoder supervision

/// Re-export transport types.
pub mod transport {
    pub use framerelay_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framerelay_frame::*;
}

/// Re-export relay types.
pub mod relay {
    pub use framerelay_relay::*;
}
