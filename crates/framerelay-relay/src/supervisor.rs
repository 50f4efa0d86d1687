use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::SupervisorError;
use crate::state::Lifecycle;
use crate::transcoder::TranscoderCommand;

/// How often `drain` checks whether the subprocess has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default bound on waiting for the transcoder after its input closes.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Subprocess lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubprocessState {
    Starting,
    Running,
    /// Input closed, waiting for exit.
    Draining,
    Exited(Option<i32>),
    Killed,
}

impl Lifecycle for SubprocessState {
    const COMPONENT: &'static str = "subprocess";

    fn can_transition_to(self, next: Self) -> bool {
        use SubprocessState::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Running, Draining)
                | (Draining, Exited(_))
                | (Draining, Killed)
                // Reaping from Drop without a drain.
                | (Running, Killed)
        )
    }
}

/// How the subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExitOutcome {
    /// Exited on its own within the drain timeout. `code` is `None` when the
    /// process was ended by a signal it did not get from us.
    Exited { code: Option<i32> },
    /// Still running at the deadline and forcibly terminated.
    Killed,
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Exited { code: Some(0) })
    }
}

/// Owns the transcoder process and the write end of its input pipe.
///
/// Standard output and error are inherited so transcoder diagnostics pass
/// straight through. The child is always reaped: by [`drain`](Self::drain)
/// normally, or by `Drop` (kill + wait) on any other exit path.
pub struct Supervisor {
    child: Child,
    stdin: Option<ChildStdin>,
    state: SubprocessState,
    program: String,
}

impl Supervisor {
    /// Launch the subprocess with its stdin bound to a fresh pipe.
    pub fn spawn(command: &TranscoderCommand) -> Result<Self, SupervisorError> {
        let mut state = SubprocessState::Starting;
        info!(command = %command, "launching transcoder");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| {
            error!(program = %command.program, error = %source, "transcoder launch failed");
            SupervisorError::Launch {
                program: command.program.clone(),
                source,
            }
        })?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SupervisorError::StdinUnavailable);
        };

        state = advance_state(state, SubprocessState::Running);
        info!(pid = child.id(), "transcoder running");

        Ok(Self {
            child,
            stdin: Some(stdin),
            state,
            program: command.program.clone(),
        })
    }

    /// Write end of the subprocess input.
    pub fn stdin(&mut self) -> Result<&mut ChildStdin, SupervisorError> {
        self.stdin.as_mut().ok_or(SupervisorError::StdinUnavailable)
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn state(&self) -> SubprocessState {
        self.state
    }

    /// Close the subprocess input and wait up to `timeout` for it to exit.
    ///
    /// If the deadline passes, the process is killed. Either way it is reaped
    /// before this returns.
    pub fn drain(mut self, timeout: Duration) -> ExitOutcome {
        self.state = advance_state(self.state, SubprocessState::Draining);
        // Dropping the write end signals end-of-input.
        drop(self.stdin.take());
        debug!(pid = self.pid(), ?timeout, "transcoder input closed; waiting for exit");

        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return self.finish_exited(status),
                Ok(None) if Instant::now() >= deadline => {
                    warn!(
                        pid = self.pid(),
                        program = %self.program,
                        ?timeout,
                        "transcoder did not exit in time; killing"
                    );
                    return self.kill_and_reap();
                }
                Ok(None) => std::thread::sleep(EXIT_POLL_INTERVAL),
                Err(err) => {
                    warn!(pid = self.pid(), error = %err, "failed to poll transcoder; killing");
                    return self.kill_and_reap();
                }
            }
        }
    }

    fn finish_exited(&mut self, status: ExitStatus) -> ExitOutcome {
        let code = status.code();
        self.state = advance_state(self.state, SubprocessState::Exited(code));
        if status.success() {
            info!(pid = self.pid(), "transcoder exited cleanly");
        } else {
            warn!(pid = self.pid(), ?code, %status, "transcoder exited with failure");
        }
        ExitOutcome::Exited { code }
    }

    fn kill_and_reap(&mut self) -> ExitOutcome {
        if let Err(err) = self.child.kill() {
            // Already exited between the last poll and the kill.
            debug!(pid = self.pid(), error = %err, "kill failed");
        }
        match self.child.wait() {
            Ok(status) => debug!(pid = self.pid(), %status, "transcoder reaped"),
            Err(err) => warn!(pid = self.pid(), error = %err, "failed to reap transcoder"),
        }
        self.state = advance_state(self.state, SubprocessState::Killed);
        ExitOutcome::Killed
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if matches!(
            self.state,
            SubprocessState::Exited(_) | SubprocessState::Killed
        ) {
            return;
        }
        drop(self.stdin.take());
        warn!(pid = self.pid(), "supervisor dropped with live transcoder; killing");
        self.kill_and_reap();
    }
}

fn advance_state(mut current: SubprocessState, next: SubprocessState) -> SubprocessState {
    if let Err(err) = crate::state::advance(&mut current, next) {
        // Internal sequencing bug; record it and keep the real state.
        error!(error = %err, "unexpected subprocess transition");
        return next;
    }
    current
}
