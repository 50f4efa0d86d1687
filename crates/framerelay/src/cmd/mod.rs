use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use framerelay_frame::{FrameConfig, InvalidFramePolicy, MAX_FRAME_BYTES};
use framerelay_relay::{RelayConfig, DEFAULT_PROGRESS_EVERY};
use framerelay_transport::DEFAULT_CHANNEL_PATH;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod bridge;
pub mod client;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Own the channel, accept one client, and feed its frames to the transcoder.
    Bridge(BridgeArgs),
    /// Read frames from stdin (or a file) and forward them to a running bridge.
    Client(ClientArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Bridge(args) => bridge::run(args, format),
        Command::Client(args) => client::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Channel socket path to create.
    #[arg(env = "FRAMERELAY_CHANNEL", default_value = DEFAULT_CHANNEL_PATH)]
    pub channel: PathBuf,
    /// JSON transcoder config; flags below override its values.
    #[arg(long, value_name = "FILE", env = "FRAMERELAY_TRANSCODER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Transcoder executable.
    #[arg(long, value_name = "PROGRAM", env = "FRAMERELAY_TRANSCODER")]
    pub program: Option<String>,
    /// Segment output template, e.g. output/output_%03d.mp4.
    #[arg(long, value_name = "TEMPLATE")]
    pub output: Option<String>,
    /// Segment length in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub segment_time: Option<u32>,
    /// Target video bitrate, e.g. 2M.
    #[arg(long)]
    pub bitrate: Option<String>,
    /// Video codec, e.g. libx264 or h264_nvenc.
    #[arg(long)]
    pub codec: Option<String>,
    /// Format of the frame payloads, e.g. mjpeg.
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<String>,
    /// How long to wait for the transcoder after closing its input (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", env = "FRAMERELAY_DRAIN_TIMEOUT")]
    pub drain_timeout: String,
    /// Run PROGRAM with only the arguments after `--`.
    #[arg(long, requires = "program")]
    pub raw: bool,
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Extra transcoder arguments.
    #[arg(last = true, value_name = "ARGS")]
    pub extra: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Channel socket path of the running bridge.
    #[arg(env = "FRAMERELAY_CHANNEL", default_value = DEFAULT_CHANNEL_PATH)]
    pub channel: PathBuf,
    /// Read frames from FILE instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    #[command(flatten)]
    pub frame: FrameArgs,
}

/// Frame handling options shared by both ends.
#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Largest accepted payload in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
    /// What to do with a frame whose length is zero or over the limit.
    #[arg(long, value_name = "POLICY", default_value = "skip")]
    pub on_invalid: OnInvalid,
    /// Log progress every N frames (0 disables).
    #[arg(long, value_name = "N", default_value_t = DEFAULT_PROGRESS_EVERY)]
    pub progress_every: u64,
}

impl FrameArgs {
    pub fn relay_config(&self) -> CliResult<RelayConfig> {
        if self.max_frame_bytes == 0 || self.max_frame_bytes as u64 > u64::from(u32::MAX) {
            return Err(CliError::new(
                USAGE,
                format!(
                    "--max-frame-bytes must be between 1 and {}",
                    u32::MAX
                ),
            ));
        }
        Ok(RelayConfig {
            frame: FrameConfig {
                max_frame_bytes: self.max_frame_bytes,
                invalid_frame_policy: self.on_invalid.into(),
                ..FrameConfig::default()
            },
            progress_every: self.progress_every,
        })
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OnInvalid {
    /// Drop the frame header and keep reading.
    Skip,
    /// Close the connection.
    Disconnect,
}

impl From<OnInvalid> for InvalidFramePolicy {
    fn from(value: OnInvalid) -> Self {
        match value {
            OnInvalid::Skip => InvalidFramePolicy::Skip,
            OnInvalid::Disconnect => InvalidFramePolicy::Disconnect,
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn frame_args_map_to_relay_config() {
        let args = FrameArgs {
            max_frame_bytes: 1024,
            on_invalid: OnInvalid::Disconnect,
            progress_every: 0,
        };
        let config = args.relay_config().unwrap();
        assert_eq!(config.frame.max_frame_bytes, 1024);
        assert_eq!(
            config.frame.invalid_frame_policy,
            InvalidFramePolicy::Disconnect
        );
        assert_eq!(config.progress_every, 0);
    }

    #[test]
    fn zero_frame_limit_is_a_usage_error() {
        let args = FrameArgs {
            max_frame_bytes: 0,
            on_invalid: OnInvalid::Skip,
            progress_every: 30,
        };
        assert_eq!(args.relay_config().unwrap_err().code, USAGE);
    }
}
