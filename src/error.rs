//! Error types used by the supervisor, the manager process and its workers.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`EnvelopeError`]: a configuration token could not be encoded or decoded.
//! - [`LaunchError`]: a manager process could not be started.
//! - [`SupervisorError`]: an abnormal event observed after a successful launch;
//!   only ever delivered to the [`ErrorHandler`](crate::ErrorHandler).
//! - [`AllocationError`]: no free worker identity despite a spawn event.
//! - [`WorkerEnvError`]: the worker-identity environment channel is unusable.
//! - [`ManagerError`] / [`WorkerError`]: failures inside the child roles.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::fmt;
use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// How a child process terminated.
///
/// A process either exits with a status code or is killed by a signal; the
/// signal number is kept as a raw integer so it survives being logged or
/// compared without a `nix` dependency at the call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// Normal exit with status code.
    Code(i32),
    /// Terminated by the given signal number.
    Signal(i32),
}

impl ExitReason {
    /// `true` for `Code(0)`.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitReason::Code(0))
    }
}

impl From<ExitStatus> for ExitReason {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => ExitReason::Code(code),
            (None, Some(sig)) => ExitReason::Signal(sig),
            // Neither code nor signal: stopped/continued, never reported by wait().
            (None, None) => ExitReason::Code(-1),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Code(code) => write!(f, "exit code {code}"),
            ExitReason::Signal(sig) => write!(f, "signal {sig}"),
        }
    }
}

/// # Errors produced while encoding or decoding a configuration token.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// The value cannot be represented as plain data.
    #[error("value cannot be encoded as plain data: {0}")]
    Encode(#[source] serde_json::Error),

    /// Token has no `<tag>:` prefix.
    #[error("malformed token: missing ':' separator")]
    MissingSeparator,

    /// Blob is not valid hex (bad digit or odd length).
    #[error("malformed token: invalid hex blob: {0}")]
    InvalidHex(#[source] faster_hex::Error),

    /// Token was produced for a different schema.
    #[error("token tagged {found:?} cannot be decoded as {expected:?}")]
    TagMismatch {
        /// Tag of the schema the caller asked for.
        expected: &'static str,
        /// Tag recorded in the token.
        found: String,
    },

    /// Blob decoded to bytes that are not a valid payload for the schema.
    #[error("malformed token payload: {0}")]
    Payload(#[source] serde_json::Error),
}

impl EnvelopeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EnvelopeError::Encode(_) => "envelope_encode",
            EnvelopeError::MissingSeparator => "envelope_missing_separator",
            EnvelopeError::InvalidHex(_) => "envelope_invalid_hex",
            EnvelopeError::TagMismatch { .. } => "envelope_tag_mismatch",
            EnvelopeError::Payload(_) => "envelope_payload",
        }
    }

    /// `true` for every failure of `decode` (malformed token).
    pub fn is_decode(&self) -> bool {
        !matches!(self, EnvelopeError::Encode(_))
    }
}

/// # Errors produced while launching a manager process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The child exited before signalling readiness.
    #[error("manager exited before signalling readiness ({0})")]
    Init(ExitReason),

    /// The child could not be spawned at all.
    #[error("failed to spawn manager: {0}")]
    Spawn(#[source] io::Error),

    /// The readiness pipe could not be created or registered.
    #[error("failed to set up readiness pipe: {0}")]
    Pipe(#[source] io::Error),

    /// Reading the readiness pipe or waiting for the child failed.
    #[error("failed while awaiting manager readiness: {0}")]
    Readiness(#[source] io::Error),

    /// The child wrote something other than the readiness sentinel.
    #[error("manager wrote unexpected readiness byte {0:#04x}")]
    InvalidReadiness(u8),

    /// The launch configuration could not be encoded.
    #[error(transparent)]
    Encode(#[from] EnvelopeError),

    /// The worker-identity variable is already present in the environment.
    #[error(transparent)]
    ConfigConflict(#[from] WorkerEnvError),
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Init(_) => "launch_init",
            LaunchError::Spawn(_) => "launch_spawn",
            LaunchError::Pipe(_) => "launch_pipe",
            LaunchError::Readiness(_) => "launch_readiness",
            LaunchError::InvalidReadiness(_) => "launch_invalid_readiness",
            LaunchError::Encode(_) => "launch_encode",
            LaunchError::ConfigConflict(_) => "launch_config_conflict",
        }
    }

    /// Exit reason of a child that died during startup, if that is what happened.
    pub fn init_exit(&self) -> Option<ExitReason> {
        match self {
            LaunchError::Init(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// # Abnormal events observed by a running supervisor.
///
/// These never terminate the supervising task; they are handed to the
/// [`ErrorHandler`](crate::ErrorHandler) and recovered by a restart.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The manager exited after it had signalled readiness.
    #[error("manager exited unexpectedly ({0})")]
    Exit(ExitReason),

    /// A relaunch attempt failed.
    #[error("manager restart failed: {0}")]
    Restart(#[source] LaunchError),

    /// Waiting on the live manager failed.
    #[error("failed to wait for manager: {0}")]
    Wait(#[source] io::Error),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Exit(_) => "supervisor_exit",
            SupervisorError::Restart(_) => "supervisor_restart",
            SupervisorError::Wait(_) => "supervisor_wait",
        }
    }
}

/// # No worker identity could be allocated.
///
/// A spawn event implies capacity, so this is a logic error, not a
/// recoverable condition.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AllocationError {
    /// Every id in `1..=desired` is held by a live worker.
    #[error("no free worker id: desired={desired}, alive={alive}")]
    Exhausted {
        /// Desired worker count at allocation time.
        desired: usize,
        /// Number of live workers at allocation time.
        alive: usize,
    },
}

impl AllocationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AllocationError::Exhausted { .. } => "allocation_exhausted",
        }
    }
}

/// # The worker-identity environment channel is unusable.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkerEnvError {
    /// The variable was set before launch; its value would be ambiguous.
    #[error("{var} is already set to {value:?}; refusing to launch")]
    Conflict {
        /// Variable name.
        var: &'static str,
        /// Pre-existing value.
        value: String,
    },

    /// A worker started without its identity.
    #[error("{var} is not set in the worker environment")]
    Missing {
        /// Variable name.
        var: &'static str,
    },

    /// The variable does not hold a positive integer.
    #[error("{var} holds invalid worker id {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

impl WorkerEnvError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerEnvError::Conflict { .. } => "worker_env_conflict",
            WorkerEnvError::Missing { .. } => "worker_env_missing",
            WorkerEnvError::Invalid { .. } => "worker_env_invalid",
        }
    }
}

/// # Failures of the manager process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ManagerError {
    /// The invocation token could not be decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Identity channel misconfigured.
    #[error(transparent)]
    WorkerEnv(#[from] WorkerEnvError),

    /// No free id for a worker that had to be spawned.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind address.
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A worker could not be spawned.
    #[error("failed to spawn worker: {0}")]
    SpawnWorker(#[source] io::Error),

    /// A worker reported that its service failed to boot.
    #[error("worker {worker_id} failed to boot")]
    WorkerBoot {
        /// Identity of the failing worker.
        worker_id: u32,
    },

    /// Any other OS-level failure (signals, runtime, readiness pipe).
    #[error("manager i/o failure: {0}")]
    Io(#[from] io::Error),
}

impl ManagerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ManagerError::Envelope(_) => "manager_envelope",
            ManagerError::WorkerEnv(_) => "manager_worker_env",
            ManagerError::Allocation(_) => "manager_allocation",
            ManagerError::Bind { .. } => "manager_bind",
            ManagerError::SpawnWorker(_) => "manager_spawn_worker",
            ManagerError::WorkerBoot { .. } => "manager_worker_boot",
            ManagerError::Io(_) => "manager_io",
        }
    }
}

/// # Failures of a worker process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The invocation token could not be decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Identity missing or invalid.
    #[error(transparent)]
    WorkerEnv(#[from] WorkerEnvError),

    /// The service factory failed to produce a service.
    #[error("service factory failed: {0}")]
    Boot(#[source] crate::service::BoxError),

    /// The service failed while serving.
    #[error("service failed: {0}")]
    Serve(#[source] crate::service::BoxError),

    /// Runtime, listener or signal setup failed.
    #[error("worker i/o failure: {0}")]
    Io(#[from] io::Error),
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Envelope(_) => "worker_envelope",
            WorkerError::WorkerEnv(_) => "worker_env",
            WorkerError::Boot(_) => "worker_boot",
            WorkerError::Serve(_) => "worker_serve",
            WorkerError::Io(_) => "worker_io",
        }
    }
}
