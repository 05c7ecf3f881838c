//! # Handle to a live manager process.
//!
//! ```text
//! Starting ──► Ready ──► Running ──► Exited
//! ```
//!
//! ## Rules
//! - States only move forward; [`ManagerProcess::advance`] ignores regressions.
//! - The exit reason is recorded once, by the first successful `wait`.
//! - No signal is sent to a process whose exit has been recorded (its pid may
//!   already belong to someone else).

use std::io;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tracing::debug;

use crate::error::ExitReason;

/// Lifecycle of a manager process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessState {
    /// Spawned, readiness not yet observed.
    Starting,
    /// Readiness byte received.
    Ready,
    /// Under supervision.
    Running,
    /// Exit observed and reaped.
    Exited,
}

/// Outcome of [`ManagerProcess::terminate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stopped {
    /// How the process ended.
    pub exit: ExitReason,
    /// `true` when SIGTERM was not enough and SIGKILL was sent.
    pub killed: bool,
}

/// A spawned manager process.
#[derive(Debug)]
pub struct ManagerProcess {
    pid: u32,
    child: Child,
    state: ProcessState,
    exit: Option<ExitReason>,
}

impl ManagerProcess {
    pub(crate) fn new(pid: u32, child: Child) -> Self {
        Self {
            pid,
            child,
            state: ProcessState::Starting,
            exit: None,
        }
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit reason, once observed.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit
    }

    /// Moves to `next`; returns `false` (and changes nothing) unless `next` is later.
    pub fn advance(&mut self, next: ProcessState) -> bool {
        if next <= self.state {
            return false;
        }
        self.state = next;
        true
    }

    /// Waits for the process to exit and reaps it.
    ///
    /// Cancel safe: dropping the future leaves the process untouched.
    pub async fn wait(&mut self) -> io::Result<ExitReason> {
        if let Some(reason) = self.exit {
            return Ok(reason);
        }
        let reason = ExitReason::from(self.child.wait().await?);
        self.exit = Some(reason);
        self.advance(ProcessState::Exited);
        Ok(reason)
    }

    /// Sends `sig`; a process that is already gone is not an error.
    pub fn signal(&self, sig: Signal) -> io::Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        match signal::kill(Pid::from_raw(self.pid as i32), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    /// SIGTERM, wait up to `grace` (forever when `None`), then SIGKILL; always reaps.
    pub async fn terminate(&mut self, grace: Option<Duration>) -> io::Result<Stopped> {
        self.signal(Signal::SIGTERM)?;

        let graceful = match grace {
            None => Some(self.wait().await?),
            Some(limit) => match tokio::time::timeout(limit, self.wait()).await {
                Ok(res) => Some(res?),
                Err(_elapsed) => None,
            },
        };
        if let Some(exit) = graceful {
            return Ok(Stopped {
                exit,
                killed: false,
            });
        }

        debug!(pid = self.pid, "manager ignored SIGTERM, sending SIGKILL");
        self.signal(Signal::SIGKILL)?;
        let exit = self.wait().await?;
        Ok(Stopped { exit, killed: true })
    }
}
