use std::io::{Read, Write};
use std::net::Shutdown;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use framerelay_frame::{write_fully, FrameError, FrameReader};
use framerelay_transport::{IpcStream, UnixDomainSocket};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{RelayError, Result};
use crate::report::{Progress, RelayReport};
use crate::state::{advance, BridgeState};
use crate::supervisor::{ExitOutcome, Supervisor};

/// Why the relay loop stopped. Every variant leads to Draining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RelayEnd {
    /// The client closed the channel.
    PeerClosed,
    /// A local shutdown was requested (e.g. Ctrl-C).
    ShutdownRequested,
    /// Reading the channel failed.
    ChannelError(String),
    /// An invalid frame arrived and the policy is to disconnect.
    InvalidFrame(String),
    /// The transcoder stopped accepting input.
    SubprocessWriteFailed(String),
}

/// Outcome of one bridge session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub relay: RelayReport,
    pub end: RelayEnd,
    pub subprocess: ExitOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    AwaitingPeer,
    Connected,
    Finished,
}

struct ShutdownState {
    requested: bool,
    phase: SessionPhase,
    accept_interrupted: bool,
    stream: Option<IpcStream>,
}

/// Requests an orderly end of a running bridge session from another thread.
///
/// While the bridge waits for a client, a request wakes the pending accept
/// and the session ends without launching the transcoder. Once a client is
/// accepted the request is only recorded until the channel is attached;
/// after that it closes the read half of the channel. Either way the relay
/// loop moves on to Draining, so a launched transcoder still gets its
/// end-of-input and is waited for.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<Mutex<ShutdownState>>,
    path: PathBuf,
}

impl ShutdownHandle {
    fn new(path: &Path) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ShutdownState {
                requested: false,
                phase: SessionPhase::AwaitingPeer,
                accept_interrupted: false,
                stream: None,
            })),
            path: path.to_path_buf(),
        }
    }

    /// Request shutdown.
    ///
    /// Returns `true` when the bridge will end the session on its own. It
    /// returns `false` only if the bridge is still waiting for a client and
    /// its socket could not be reached to wake the accept.
    pub fn request(&self) -> bool {
        let mut state = self.lock();
        state.requested = true;
        match state.phase {
            SessionPhase::AwaitingPeer => {
                state.accept_interrupted = true;
                match UnixDomainSocket::connect(&self.path) {
                    Ok(_) => {
                        debug!(path = ?self.path, "woke pending accept");
                        true
                    }
                    Err(err) => {
                        warn!(error = %err, "could not wake pending accept");
                        false
                    }
                }
            }
            SessionPhase::Connected => {
                if let Some(stream) = &state.stream {
                    if let Err(err) = stream.shutdown(Shutdown::Read) {
                        warn!(error = %err, "failed to shut down channel");
                    }
                }
                true
            }
            SessionPhase::Finished => true,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.lock().requested
    }

    /// Record that a peer was accepted. Returns `true` if the accept was
    /// woken by a shutdown request rather than a real client going through.
    fn mark_connected(&self) -> bool {
        let mut state = self.lock();
        state.phase = SessionPhase::Connected;
        state.accept_interrupted
    }

    /// Register the channel for external shutdown. Returns whether shutdown
    /// was already requested.
    fn attach(&self, stream: &IpcStream) -> bool {
        let clone = stream.try_clone();
        let mut state = self.lock();
        match clone {
            Ok(clone) => state.stream = Some(clone),
            Err(err) => warn!(error = %err, "channel cannot be shut down externally"),
        }
        state.requested
    }

    fn detach(&self) {
        let mut state = self.lock();
        state.stream = None;
        state.phase = SessionPhase::Finished;
    }

    fn lock(&self) -> MutexGuard<'_, ShutdownState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Server side of the relay: accepts one client and feeds its frame payloads
/// to the supervised transcoder.
pub struct Bridge {
    listener: UnixDomainSocket,
    config: BridgeConfig,
    state: BridgeState,
    shutdown: ShutdownHandle,
}

impl Bridge {
    /// Create the named channel. The transcoder is not launched until a
    /// client connects.
    pub fn bind(path: impl AsRef<Path>, config: BridgeConfig) -> Result<Self> {
        let listener = UnixDomainSocket::bind(path)?;
        let shutdown = ShutdownHandle::new(listener.path());
        Ok(Self {
            listener,
            config,
            state: BridgeState::Listening,
            shutdown,
        })
    }

    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run one session to completion.
    ///
    /// Errors are returned only for failures before relaying starts: accept,
    /// transcoder launch, or a shutdown request while no client had
    /// connected. Once the transcoder is running, every ending drains it and
    /// yields a [`SessionReport`].
    pub fn run(self) -> Result<SessionReport> {
        let Bridge {
            listener,
            config,
            mut state,
            shutdown,
        } = self;
        let path: PathBuf = listener.path().to_path_buf();

        advance(&mut state, BridgeState::AwaitingPeer)?;
        info!(?path, "waiting for relay client");
        let stream = match listener.accept_one() {
            Ok(stream) => stream,
            Err(err) => {
                advance(&mut state, BridgeState::Closed)?;
                return Err(err.into());
            }
        };
        if shutdown.mark_connected() {
            info!("shutdown requested before a client connected");
            drop(stream);
            advance(&mut state, BridgeState::Closed)?;
            return Err(RelayError::Interrupted);
        }

        let peer_pid = stream.peer_credentials().map(|creds| {
            info!(pid = creds.pid, uid = creds.uid, "relay client connected");
            creds.pid
        });
        if peer_pid.is_none() {
            info!("relay client connected");
        }

        advance(&mut state, BridgeState::Launching)?;
        let mut supervisor = match Supervisor::spawn(&config.command) {
            Ok(supervisor) => supervisor,
            Err(err) => {
                advance(&mut state, BridgeState::Closed)?;
                return Err(err.into());
            }
        };
        let mut reader = FrameReader::with_config(stream, config.relay.frame.clone());
        let progress = Progress::new(config.relay.progress_every);

        let mut end = if shutdown.attach(reader.get_ref()) {
            info!("shutdown requested during launch; skipping relay");
            RelayEnd::ShutdownRequested
        } else {
            advance(&mut state, BridgeState::Relaying)?;
            match supervisor.stdin() {
                Ok(stdin) => pump_frames(&mut reader, stdin, &progress),
                Err(err) => RelayEnd::SubprocessWriteFailed(err.to_string()),
            }
        };
        shutdown.detach();
        if end == RelayEnd::PeerClosed && shutdown.is_requested() {
            end = RelayEnd::ShutdownRequested;
        }
        let relay = RelayReport::new(reader.stats(), progress.elapsed());
        drop(reader);

        advance(&mut state, BridgeState::Draining)?;
        info!(
            end = ?end,
            frames = relay.frames,
            rejected = relay.rejected,
            "relay loop ended; draining transcoder"
        );
        let subprocess = supervisor.drain(config.drain_timeout);

        advance(&mut state, BridgeState::Closed)?;
        Ok(SessionReport {
            relay,
            end,
            subprocess,
            peer_pid,
        })
    }
}

/// Deliver each frame's payload (no header) to `sink` until the channel ends.
///
/// Frames are written in arrival order, each one completely before the next
/// is read.
pub fn pump_frames<R: Read, W: Write + ?Sized>(
    reader: &mut FrameReader<R>,
    sink: &mut W,
    progress: &Progress,
) -> RelayEnd {
    loop {
        let frame = match reader.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("channel end-of-stream");
                return RelayEnd::PeerClosed;
            }
            Err(err @ FrameError::InvalidLength { .. }) => {
                warn!(error = %err, "invalid frame; dropping connection");
                return RelayEnd::InvalidFrame(err.to_string());
            }
            Err(err) => {
                warn!(error = %err, "channel read failed");
                return RelayEnd::ChannelError(err.to_string());
            }
        };

        if let Err(err) = deliver(sink, &frame.payload) {
            warn!(error = %err, "transcoder input write failed");
            return RelayEnd::SubprocessWriteFailed(err.to_string());
        }
        progress.record(&reader.stats());
    }
}

fn deliver<W: Write + ?Sized>(sink: &mut W, payload: &[u8]) -> framerelay_frame::Result<()> {
    write_fully(sink, payload)?;
    sink.flush().map_err(FrameError::Io)
}
