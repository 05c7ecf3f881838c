//! # Role dispatch.
//!
//! One binary hosts all three roles. The supervisor spawns
//! `<exe> [prefix..] run <token>` for the manager, and the manager spawns
//! `<exe> [prefix..] worker <token>` for each worker. The host calls
//! [`run_child_role`] first thing in `main`:
//!
//! ```rust,no_run
//! # use poolvisor::{BoxError, Service, ServiceFactory, WorkerInfo};
//! # struct App;
//! # #[async_trait::async_trait]
//! # impl Service for App {
//! #     async fn serve(&self, _: tokio::net::TcpListener, t: tokio_util::sync::CancellationToken) -> Result<(), BoxError> {
//! #         t.cancelled().await; Ok(())
//! #     }
//! # }
//! # struct AppFactory;
//! # #[async_trait::async_trait]
//! # impl ServiceFactory for AppFactory {
//! #     type Service = App;
//! #     async fn create(&self, _: &WorkerInfo) -> Result<App, BoxError> { Ok(App) }
//! # }
//! fn main() -> std::process::ExitCode {
//!     if let Some(code) = poolvisor::run_child_role(AppFactory) {
//!         return code;
//!     }
//!     // supervisor role: build a runtime, Supervisor::start(...), ...
//!     std::process::ExitCode::SUCCESS
//! }
//! ```
//!
//! ## Exit codes
//! | role    | outcome                            | code |
//! |---------|------------------------------------|------|
//! | manager | graceful stop                      | 0    |
//! | manager | a worker failed to boot            | 3    |
//! | manager | any other failure                  | 1    |
//! | worker  | stopped by signal                  | 0    |
//! | worker  | failure before serving (boot)      | 3    |
//! | worker  | service failed while serving       | 1    |

use std::ffi::OsString;
use std::process::ExitCode;

use crate::envelope::{self, Envelope};
use crate::error::{ManagerError, WorkerError};
use crate::launch::{ManagerContext, RUN_VERB};
use crate::manager;
use crate::service::ServiceFactory;
use crate::worker::{self, NoHooks, SpawnHooks, WORKER_BOOT_ERROR, WORKER_VERB, WorkerContext};

/// Which role an invocation asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Role {
    /// `[prefix..] run <token>`
    Manager {
        /// Arguments between the program name and the verb.
        prefix: Vec<OsString>,
        /// Encoded manager context.
        token: String,
    },
    /// `[prefix..] worker <token>`
    Worker {
        /// Encoded worker context.
        token: String,
    },
}

impl Role {
    /// Detects a child role from a full argument vector (program name first).
    ///
    /// The verb must be the second-to-last argument and the last one must be
    /// a token carrying the matching tag (or the anonymous tag).
    pub fn detect(args: &[OsString]) -> Option<Role> {
        let [program_and_prefix @ .., verb, token] = args else {
            return None;
        };
        let prefix = program_and_prefix.get(1..)?.to_vec();
        let token = token.to_str()?;
        let tag = envelope::peek_tag(token).ok()?;
        let accepts = |expected: &str| tag.is_empty() || tag == expected;

        match verb.to_str()? {
            RUN_VERB if accepts(ManagerContext::TAG) => Some(Role::Manager {
                prefix,
                token: token.to_owned(),
            }),
            WORKER_VERB if accepts(WorkerContext::TAG) => Some(Role::Worker {
                token: token.to_owned(),
            }),
            _ => None,
        }
    }
}

/// Runs the manager or worker role if this process was spawned as one.
///
/// Returns `None` in the supervisor (or any unrelated) invocation. Call it
/// before starting threads or a runtime: the worker role edits its own
/// environment.
pub fn run_child_role<F: ServiceFactory>(factory: F) -> Option<ExitCode> {
    run_child_role_with(factory, NoHooks)
}

/// [`run_child_role`] with manager spawn hooks.
pub fn run_child_role_with<F, H>(factory: F, hooks: H) -> Option<ExitCode>
where
    F: ServiceFactory,
    H: SpawnHooks,
{
    let args: Vec<OsString> = std::env::args_os().collect();
    let code = match Role::detect(&args)? {
        Role::Manager { prefix, token } => manager_exit_code(manager::run(&token, prefix, hooks)),
        Role::Worker { token } => worker_exit_code(worker::runtime::run(&token, factory)),
    };
    Some(ExitCode::from(code))
}

fn manager_exit_code(result: Result<(), ManagerError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(ManagerError::WorkerBoot { .. }) => WORKER_BOOT_ERROR as u8,
        Err(_) => 1,
    }
}

fn worker_exit_code(result: Result<(), WorkerError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(WorkerError::Serve(_)) => 1,
        Err(_) => WORKER_BOOT_ERROR as u8,
    }
}
