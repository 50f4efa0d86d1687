use std::path::PathBuf;

/// Errors from launching or managing the transcoder subprocess.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The transcoder could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    /// The subprocess input has already been closed.
    #[error("subprocess stdin is not available")]
    StdinUnavailable,

    /// The output path template is malformed.
    #[error("invalid segment template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The transcoder configuration file could not be loaded.
    #[error("invalid transcoder config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Preparing the output location failed.
    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that end a relay session.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Channel bind, accept, or connect failed.
    #[error("channel error: {0}")]
    Transport(#[from] framerelay_transport::TransportError),

    /// Reading the upstream frame stream failed.
    #[error("upstream read failed: {0}")]
    Upstream(framerelay_frame::FrameError),

    /// Writing a frame to the channel failed.
    #[error("channel write failed: {0}")]
    ChannelWrite(framerelay_frame::FrameError),

    /// Transcoder subprocess error.
    #[error("subprocess error: {0}")]
    Supervisor(#[from] SupervisorError),

    /// Shutdown was requested while no client had connected.
    #[error("interrupted before a client connected")]
    Interrupted,

    /// A component attempted a lifecycle step its state does not allow.
    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, RelayError>;
