use std::time::Duration;

use framerelay_frame::FrameConfig;

use crate::report::DEFAULT_PROGRESS_EVERY;
use crate::supervisor::DEFAULT_DRAIN_TIMEOUT;
use crate::transcoder::TranscoderCommand;

/// Settings shared by both ends of the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frame bounds, invalid-frame policy, and stream timeouts.
    pub frame: FrameConfig,
    /// Frames between progress log lines; `0` disables them.
    pub progress_every: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Bridge settings: relay options plus the supervised transcoder.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub relay: RelayConfig,
    /// Command launched once a peer has connected.
    pub command: TranscoderCommand,
    /// How long to wait for the transcoder after closing its input.
    pub drain_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(command: TranscoderCommand) -> Self {
        Self {
            relay: RelayConfig::default(),
            command,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}
