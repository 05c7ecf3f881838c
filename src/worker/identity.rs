//! # Worker identity and its environment channel.
//!
//! The manager hands each worker its id through [`WORKER_ID_ENV`]; the worker
//! reads (and clears) it exactly once, before anything else.

use std::fmt;
use std::num::NonZeroU32;

use tokio::process::Command;

use crate::error::WorkerEnvError;

/// Environment variable carrying the worker id.
pub const WORKER_ID_ENV: &str = "POOLVISOR_WORKER_ID";

/// Small positive integer naming a worker slot (`1..=desired`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(NonZeroU32);

impl WorkerId {
    /// The lowest id; also the id of a service run without a pool.
    pub const FIRST: WorkerId = WorkerId(NonZeroU32::MIN);

    /// `None` for 0.
    pub const fn new(id: u32) -> Option<Self> {
        match NonZeroU32::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Numeric value.
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Parses the textual form used in the environment.
    pub fn parse(value: &str) -> Result<Self, WorkerEnvError> {
        value
            .trim()
            .parse::<NonZeroU32>()
            .map(Self)
            .map_err(|_| WorkerEnvError::Invalid {
                var: WORKER_ID_ENV,
                value: value.to_owned(),
            })
    }

    /// Reads the id from the environment of the current process.
    pub fn from_env() -> Result<Self, WorkerEnvError> {
        let raw = std::env::var_os(WORKER_ID_ENV).ok_or(WorkerEnvError::Missing {
            var: WORKER_ID_ENV,
        })?;
        match raw.to_str() {
            Some(value) => Self::parse(value),
            None => Err(WorkerEnvError::Invalid {
                var: WORKER_ID_ENV,
                value: raw.to_string_lossy().into_owned(),
            }),
        }
    }

    /// Reads the id and removes the variable so nothing spawned later inherits it.
    ///
    /// # Safety
    /// Must run while the process is still single-threaded.
    pub unsafe fn take_from_env() -> Result<Self, WorkerEnvError> {
        let id = Self::from_env();
        // SAFETY: forwarded to the caller.
        unsafe { std::env::remove_var(WORKER_ID_ENV) };
        id
    }

    /// Fails when the variable is already present in this process.
    ///
    /// A pre-set value would make the identity of every worker ambiguous.
    pub fn ensure_unset() -> Result<(), WorkerEnvError> {
        match std::env::var_os(WORKER_ID_ENV) {
            None => Ok(()),
            Some(value) => Err(WorkerEnvError::Conflict {
                var: WORKER_ID_ENV,
                value: value.to_string_lossy().into_owned(),
            }),
        }
    }

    /// Delivers this id to the child spawned from `cmd`.
    pub fn apply_to(self, cmd: &mut Command) {
        cmd.env(WORKER_ID_ENV, self.to_string());
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
