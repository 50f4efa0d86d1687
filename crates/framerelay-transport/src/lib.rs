//! Named channel transport for framerelay.
//!
//! The relay client and the bridge talk over a single byte-oriented channel
//! identified by a well-known name. On Unix the name is a filesystem path to a
//! Unix domain socket.
//!
//! This is the lowest layer. Everything else builds on top of the
//! [`IpcStream`] type provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{IpcStream, PeerCredentials};

#[cfg(unix)]
pub use uds::UnixDomainSocket;

/// Well-known channel name used when none is configured.
pub const DEFAULT_CHANNEL_PATH: &str = "/tmp/framerelay.sock";
