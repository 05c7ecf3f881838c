//! # poolvisor
//!
//! **Poolvisor** hosts a network service behind a supervised, restartable
//! pool of worker processes.
//!
//! A single binary plays three roles:
//! - the **supervisor** (your `main`): launches one manager process, waits for
//!   its readiness byte, relaunches it with backoff whenever it dies;
//! - the **manager**: binds the listening socket, keeps `workers` worker
//!   processes alive, hands each a small stable id, scales on signals;
//! - the **workers**: adopt the shared socket and serve it through your
//!   [`ServiceFactory`].
//!
//! ## Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ supervisor process                                               │
//! │   Supervisor::start(options) ──► SupervisorActor (restart loop)  │
//! │        │                             │ publish                   │
//! │        │ launch()                    ▼                           │
//! │        │                    Bus ──► SubscriberSet ──► LogWriter  │
//! └────────┼─────────────────────────────────────────────────────────┘
//!          │ <exe> run <manager.v1 token>          ▲ 'i' on fd 3
//!          ▼                                       │
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ manager process        OrphanMonitor(root_pid)                   │
//! │   bind ─► WorkerIdentityAllocator ─► spawn ─► WorkerTable        │
//! │   SIGTTIN/SIGTTOU scale, SIGTERM graceful stop                   │
//! └────────┬───────────────────┬───────────────────┬─────────────────┘
//!          │ <exe> worker <worker.v1 token>, fd 3 = listener, id in env
//!          ▼                   ▼                   ▼
//!     ┌──────────┐        ┌──────────┐        ┌──────────┐
//!     │ worker 1 │        │ worker 2 │        │ worker N │
//!     │ Service  │        │ Service  │        │ Service  │
//!     └──────────┘        └──────────┘        └──────────┘
//! ```
//!
//! ### Supervision lifecycle
//! ```text
//! Launching ──► Supervising ──► Reporting ──► Backoff ──► Launching
//!                   └──────── cancel ─────────────┴──► Cancelled
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                        |
//! |-------------------|----------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | Launch, restart with backoff, cancel with cleanup.       | [`Supervisor`], [`SupervisorHandle`]      |
//! | **Application**   | The served network service, one instance per worker.     | [`ServiceFactory`], [`Service`]           |
//! | **In-process**    | The same service without manager or pool.                | [`serve_in_process`]                      |
//! | **Subscriber API**| Hook into supervisor lifecycle events.                   | [`Subscribe`], [`Event`], [`LogWriter`]   |
//! | **Policies**      | Relaunch delay and jitter.                               | [`BackoffPolicy`], [`JitterPolicy`]       |
//! | **Errors**        | Typed errors per role.                                   | [`LaunchError`], [`SupervisorError`], ... |
//! | **Configuration** | Supervisor knobs and options shipped to the children.    | [`SupervisorConfig`], [`RunnerOptions`]   |
//!
//! ## Example
//! ```rust,no_run
//! use std::process::ExitCode;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use poolvisor::{
//!     BoxError, LogWriter, RunnerOptions, Service, ServiceFactory, Supervisor,
//!     SupervisorConfig, WorkerInfo,
//! };
//!
//! struct Idle;
//!
//! #[async_trait]
//! impl Service for Idle {
//!     async fn serve(&self, _l: TcpListener, stop: CancellationToken) -> Result<(), BoxError> {
//!         stop.cancelled().await;
//!         Ok(())
//!     }
//! }
//!
//! struct IdleFactory;
//!
//! #[async_trait]
//! impl ServiceFactory for IdleFactory {
//!     type Service = Idle;
//!     async fn create(&self, _info: &WorkerInfo) -> Result<Idle, BoxError> {
//!         Ok(Idle)
//!     }
//! }
//!
//! fn main() -> ExitCode {
//!     if let Some(code) = poolvisor::run_child_role(IdleFactory) {
//!         return code;
//!     }
//!
//!     let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//!     rt.block_on(async {
//!         let handle = Supervisor::new(SupervisorConfig::default())
//!             .with_subscriber(Arc::new(LogWriter::new()))
//!             .start(RunnerOptions::new("127.0.0.1:8080").with_workers(2))
//!             .await
//!             .unwrap();
//!         tokio::signal::ctrl_c().await.unwrap();
//!         handle.shutdown().await;
//!     });
//!     ExitCode::SUCCESS
//! }
//! ```
mod core;
mod entry;
mod error;
mod events;
mod launch;
mod manager;
mod options;
mod os_signals;
mod policies;
mod service;
mod subscribers;
mod worker;

pub mod envelope;

// ---- Public re-exports ----

pub use core::{
    ErrorHandler, LogErrors, Supervisor, SupervisorConfig, SupervisorHandle, SupervisorState,
    SupervisorStatus,
};
pub use entry::{Role, run_child_role, run_child_role_with};
pub use error::{
    AllocationError, EnvelopeError, ExitReason, LaunchError, ManagerError, SupervisorError,
    WorkerEnvError, WorkerError,
};
pub use events::{Bus, Event, EventKind};
pub use launch::{
    ManagerCommand, ManagerContext, ManagerProcess, ProcessState, READY_BYTE, READY_FD,
    ReadinessNotifier, ReadinessPipe, Stopped, launch,
};
pub use manager::{ORPHAN_CHECK_INTERVAL, OrphanMonitor, OsParent, ParentProbe};
pub use options::{GRACEFUL_TIMEOUT_KEY, RunnerOptions, RuntimeFlavor};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use service::{BoxError, Service, ServiceFactory, WorkerInfo};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use worker::{
    DesiredWorkers, LISTEN_FD, NoHooks, SpawnHooks, WORKER_BOOT_ERROR, WORKER_ID_ENV,
    WorkerCensus, WorkerContext, WorkerId, WorkerIdentityAllocator, WorkerSlot, WorkerTable,
};
pub use worker::runtime::serve_in_process;
