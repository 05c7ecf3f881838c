//! # Subprocess launcher.
//!
//! Spawns the manager and races its exit against the readiness byte.
//!
//! ## Outcomes
//! ```text
//! byte 'i'           → Ok(ManagerProcess { state: Ready })
//! child exit first   → Err(Init(exit reason))
//! EOF, no byte       → wait for exit → Err(Init(exit reason))
//! any other byte     → kill child → Err(InvalidReadiness(byte))
//! cancelled          → Ok(Launched::Cancelled(process)), still alive, for the caller to stop
//! ```

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::pipe::{READY_BYTE, ReadinessPipe};
use super::process::{ManagerProcess, ProcessState};
use super::{ManagerContext, RUN_VERB};
use crate::envelope;
use crate::error::{ExitReason, LaunchError};
use crate::options::RunnerOptions;
use crate::worker::WorkerId;

/// Program (plus leading arguments) that hosts the manager role.
///
/// The launcher appends `run <token>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerCommand {
    program: Option<PathBuf>,
    args: Vec<OsString>,
}

impl ManagerCommand {
    /// The currently running executable, no extra arguments.
    pub fn current_exe() -> Self {
        Self::default()
    }

    /// An explicit program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            args: Vec::new(),
        }
    }

    /// Appends one argument placed before the `run` verb.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn program(&self) -> io::Result<PathBuf> {
        match &self.program {
            Some(p) => Ok(p.clone()),
            None => std::env::current_exe(),
        }
    }

    fn build(&self, token: String) -> io::Result<Command> {
        let mut cmd = Command::new(self.program()?);
        cmd.args(&self.args).arg(RUN_VERB).arg(token).kill_on_drop(true);
        Ok(cmd)
    }
}

enum Race {
    Byte(io::Result<Option<u8>>),
    Exit(io::Result<ExitStatus>),
    Cancelled,
}

/// Result of [`launch_until_cancelled`].
#[derive(Debug)]
pub(crate) enum Launched {
    /// Readiness observed.
    Ready(ManagerProcess),
    /// Cancelled before readiness; the process may still be running.
    Cancelled(ManagerProcess),
}

/// Launches a manager and waits until it is ready or dead.
///
/// Must be called from within a tokio runtime.
pub async fn launch(
    command: &ManagerCommand,
    options: &RunnerOptions,
) -> Result<ManagerProcess, LaunchError> {
    match spawn_and_race(command, options, None).await? {
        Launched::Ready(process) | Launched::Cancelled(process) => Ok(process),
    }
}

/// Like [`launch`], but stops waiting for readiness once `cancel` fires.
pub(crate) async fn launch_until_cancelled(
    command: &ManagerCommand,
    options: &RunnerOptions,
    cancel: &CancellationToken,
) -> Result<Launched, LaunchError> {
    spawn_and_race(command, options, Some(cancel)).await
}

async fn spawn_and_race(
    command: &ManagerCommand,
    options: &RunnerOptions,
    cancel: Option<&CancellationToken>,
) -> Result<Launched, LaunchError> {
    WorkerId::ensure_unset()?;

    let mut pipe = ReadinessPipe::new().map_err(LaunchError::Pipe)?;
    let ctx = ManagerContext {
        options: options.clone(),
        ready_fd: super::READY_FD,
    };
    let mut cmd = command
        .build(envelope::encode(&ctx)?)
        .map_err(LaunchError::Spawn)?;
    pipe.install(&mut cmd).map_err(LaunchError::Pipe)?;

    let child = cmd.spawn().map_err(LaunchError::Spawn);
    pipe.close_writer();
    let mut child = child?;
    let pid = child.id().unwrap_or_default();
    debug!(pid, "manager spawned, awaiting readiness");

    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    let race = tokio::select! {
        biased;
        byte = pipe.read_byte() => Race::Byte(byte),
        status = child.wait() => Race::Exit(status),
        _ = cancelled => Race::Cancelled,
    };

    let failure = match race {
        Race::Byte(Ok(Some(READY_BYTE))) => {
            let mut proc = ManagerProcess::new(pid, child);
            proc.advance(ProcessState::Ready);
            return Ok(Launched::Ready(proc));
        }
        Race::Cancelled => {
            debug!(pid, "launch cancelled before readiness");
            return Ok(Launched::Cancelled(ManagerProcess::new(pid, child)));
        }
        Race::Byte(Ok(Some(other))) => {
            warn!(pid, byte = other, "unexpected readiness byte, killing manager");
            LaunchError::InvalidReadiness(other)
        }
        Race::Byte(Ok(None)) => {
            let status = child.wait().await.map_err(LaunchError::Readiness)?;
            return Err(LaunchError::Init(ExitReason::from(status)));
        }
        Race::Byte(Err(e)) => LaunchError::Readiness(e),
        Race::Exit(Ok(status)) => return Err(LaunchError::Init(ExitReason::from(status))),
        Race::Exit(Err(e)) => LaunchError::Readiness(e),
    };

    // The child may still be running; do not leave it behind.
    let _ = child.start_kill();
    let _ = child.wait().await;
    Err(failure)
}
