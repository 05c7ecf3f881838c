//! # Manager launch: readiness handshake and the live process handle.
//!
//! ```text
//! supervisor                                    manager process
//! ──────────                                    ───────────────
//! ReadinessPipe::new()
//! spawn  <program> [prefix..] run <token>  ───► decode ManagerContext
//! close own write end                            bind, spawn workers
//! select! {                                      ReadinessNotifier::notify()
//!     byte on pipe   ──► ManagerProcess (Ready) ◄─── 'i' on fd 3
//!     child exit     ──► LaunchError::Init
//! }
//! ```
//!
//! ## Rules
//! - One pipe per launch, never reused.
//! - The write end exists in the child only as [`READY_FD`]; the parent closes
//!   its copy right after spawn so EOF is observable.
//! - When readiness and exit are both ready, readiness wins.
//! - There is no launch timeout; wrap [`launch`] externally if one is needed.

mod launcher;
mod pipe;
mod process;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::options::RunnerOptions;

pub use launcher::{ManagerCommand, launch};
pub(crate) use launcher::{Launched, launch_until_cancelled};
pub use pipe::{READY_BYTE, READY_FD, ReadinessNotifier, ReadinessPipe};
pub(crate) use pipe::inherit_fd;
pub use process::{ManagerProcess, ProcessState, Stopped};

/// Invocation verb of the manager role.
pub const RUN_VERB: &str = "run";

/// Configuration handed to the manager process on its command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManagerContext {
    /// Runner options, unchanged from the supervisor.
    pub options: RunnerOptions,
    /// Descriptor the manager writes its readiness byte to.
    pub ready_fd: i32,
}

impl Envelope for ManagerContext {
    const TAG: &'static str = "manager.v1";
}
