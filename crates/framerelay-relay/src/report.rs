use std::time::{Duration, Instant};

use framerelay_frame::FrameStats;
use serde::Serialize;
use tracing::info;

/// Default number of frames between progress log lines.
pub const DEFAULT_PROGRESS_EVERY: u64 = 30;

/// Totals for one relay loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayReport {
    pub frames: u64,
    pub payload_bytes: u64,
    pub rejected: u64,
    pub truncated_bytes: u64,
    pub elapsed_ms: u64,
    pub fps: f64,
}

impl RelayReport {
    pub fn new(stats: FrameStats, elapsed: Duration) -> Self {
        Self {
            frames: stats.frames,
            payload_bytes: stats.payload_bytes,
            rejected: stats.rejected,
            truncated_bytes: stats.truncated_bytes,
            elapsed_ms: elapsed.as_millis().min(u64::MAX as u128) as u64,
            fps: frames_per_second(stats.frames, elapsed),
        }
    }
}

/// Periodic throughput logging.
#[derive(Debug)]
pub struct Progress {
    every: u64,
    started: Instant,
}

impl Progress {
    /// Log every `every` frames; `0` disables progress lines.
    pub fn new(every: u64) -> Self {
        Self {
            every,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record that `stats.frames` frames have been relayed so far.
    pub fn record(&self, stats: &FrameStats) {
        if self.every == 0 || stats.frames == 0 || stats.frames % self.every != 0 {
            return;
        }
        let fps = frames_per_second(stats.frames, self.elapsed());
        info!(
            frames = stats.frames,
            bytes = stats.payload_bytes,
            rejected = stats.rejected,
            fps = (fps * 10.0).round() / 10.0,
            "relay progress"
        );
    }
}

fn frames_per_second(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        return 0.0;
    }
    frames as f64 / secs
}
