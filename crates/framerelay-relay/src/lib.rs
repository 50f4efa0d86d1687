//! Both ends of the frame relay, plus transcoder supervision.
//!
//! A [`RelayClient`] reads a framed stream (usually its own stdin), drops
//! frames with invalid lengths, and forwards the rest over a named channel.
//! A [`Bridge`] owns that channel, accepts exactly one client, launches the
//! transcoder under a [`Supervisor`], and writes each payload (header
//! stripped) to the transcoder's stdin until the client goes away.

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod report;
pub mod state;
pub mod supervisor;
pub mod transcoder;

pub use bridge::{pump_frames, Bridge, RelayEnd, SessionReport, ShutdownHandle};
pub use client::{forward_frames, RelayClient};
pub use config::{BridgeConfig, RelayConfig};
pub use error::{RelayError, Result, SupervisorError};
pub use report::{Progress, RelayReport, DEFAULT_PROGRESS_EVERY};
pub use state::{advance, BridgeState, ClientState, Lifecycle};
pub use supervisor::{ExitOutcome, SubprocessState, Supervisor, DEFAULT_DRAIN_TIMEOUT};
pub use transcoder::{SegmentTemplate, TranscoderCommand, TranscoderConfig};
