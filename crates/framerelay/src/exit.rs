use std::fmt;
use std::io;

use framerelay_frame::FrameError;
use framerelay_relay::{RelayError, SupervisorError};
use framerelay_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const LAUNCH_FAILED: i32 = 5;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
/// Ctrl-C before any client connected.
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::UnexpectedEof => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err.io_source().map(io::Error::kind) {
        Some(io::ErrorKind::TimedOut) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidLength { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn supervisor_error(context: &str, err: SupervisorError) -> CliError {
    match err {
        SupervisorError::Launch { .. } | SupervisorError::StdinUnavailable => {
            CliError::new(LAUNCH_FAILED, format!("{context}: {err}"))
        }
        SupervisorError::InvalidTemplate { .. } | SupervisorError::Config { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SupervisorError::OutputDir { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    match err {
        RelayError::Transport(err) => transport_error(context, err),
        RelayError::Upstream(err) | RelayError::ChannelWrite(err) => frame_error(context, err),
        RelayError::Interrupted => CliError::new(INTERRUPTED, format!("{context}: {err}")),
        RelayError::Supervisor(err) => supervisor_error(context, err),
        other @ RelayError::InvalidTransition { .. } => {
            CliError::new(INTERNAL, format!("{context}: {other}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn connect_failure_is_a_transport_error() {
        let err = RelayError::Transport(TransportError::Connect {
            path: PathBuf::from("/tmp/missing.sock"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        let cli = relay_error("connect failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn launch_failure_has_its_own_code() {
        let err = RelayError::Supervisor(SupervisorError::Launch {
            program: "ffmpeg".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(relay_error("bridge failed", err).code, LAUNCH_FAILED);
    }

    #[test]
    fn invalid_upstream_frame_is_invalid_data() {
        let err = RelayError::Upstream(FrameError::InvalidLength { len: 0, max: 10 });
        assert_eq!(relay_error("relay failed", err).code, DATA_INVALID);
    }

    #[test]
    fn broken_channel_is_a_plain_failure() {
        let err = RelayError::ChannelWrite(FrameError::Io(io::Error::from(
            io::ErrorKind::BrokenPipe,
        )));
        assert_eq!(relay_error("relay failed", err).code, FAILURE);
    }

    #[test]
    fn interrupt_before_any_client_exits_130() {
        let cli = relay_error("bridge failed", RelayError::Interrupted);
        assert_eq!(cli.code, INTERRUPTED);
        assert_eq!(cli.message, "bridge failed: interrupted before a client connected");
    }
}
