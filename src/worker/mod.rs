//! # Workers: identities, the live table and the worker process body.
//!
//! ```text
//! manager                                   worker process
//! ───────                                   ──────────────
//! allocate(table)  ──► id                   WorkerId::take_from_env()
//! spawn <exe> worker <token>                decode WorkerContext
//!   env  POOLVISOR_WORKER_ID=id      ───►   adopt fd 3 as TcpListener
//!   fd 3 = shared listener                  factory.create(&WorkerInfo)
//! table.insert(id, pid)                     serve until SIGTERM
//! ... reaped ──► table.remove(id, pid)      close, exit 0
//! ```

mod allocator;
mod identity;
pub mod runtime;
mod table;

use std::os::fd::RawFd;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::options::RunnerOptions;

pub use allocator::{DesiredWorkers, NoHooks, SpawnHooks, WorkerCensus, WorkerIdentityAllocator};
pub use identity::{WORKER_ID_ENV, WorkerId};
pub use table::{WorkerSlot, WorkerTable};

/// Invocation verb of the worker role.
pub const WORKER_VERB: &str = "worker";

/// Descriptor number of the shared listening socket inside a worker.
pub const LISTEN_FD: RawFd = 3;

/// Exit code of a worker whose service could not be booted.
///
/// A manager that reaps a worker with this code stops the pool and exits
/// with the same code.
pub const WORKER_BOOT_ERROR: i32 = 3;

/// Configuration handed to each worker on its command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerContext {
    /// Runner options, unchanged from the supervisor.
    pub options: RunnerOptions,
    /// Pid of the spawning manager; any other parent means we were orphaned.
    pub manager_pid: u32,
}

impl Envelope for WorkerContext {
    const TAG: &'static str = "worker.v1";
}
