//! # Worker process body.
//!
//! ## Rules
//! - The identity is read from the environment once, before anything else.
//! - The factory is invoked exactly once; any failure up to and including it
//!   is a boot failure ([`WORKER_BOOT_ERROR`](super::WORKER_BOOT_ERROR)).
//! - SIGTERM/SIGINT cancel the serve token; the service is closed afterwards.
//!
//! [`serve_in_process`] runs the same service lifecycle without any child
//! process, for development and tests.

use std::os::fd::FromRawFd;

use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{LISTEN_FD, WorkerContext, WorkerId};
use crate::envelope;
use crate::error::WorkerError;
use crate::manager::OrphanMonitor;
use crate::options::{RunnerOptions, RuntimeFlavor};
use crate::os_signals::StopSignals;
use crate::service::{Service, ServiceFactory, WorkerInfo};

/// Runs the worker role until it is told to stop.
///
/// Must be called while the process is still single-threaded.
pub fn run<F: ServiceFactory>(token: &str, factory: F) -> Result<(), WorkerError> {
    // SAFETY: documented precondition; no other thread exists yet.
    let id = unsafe { WorkerId::take_from_env() }?;
    let ctx: WorkerContext = envelope::decode(token)?;

    let monitor = OrphanMonitor::start(ctx.manager_pid)?;
    let runtime = build_runtime(ctx.options.runtime_flavor())?;
    let result = runtime.block_on(serve(id, ctx, factory));
    drop(runtime);
    monitor.stop();

    if let Err(e) = &result {
        error!(worker_id = id.get(), error = %e, label = e.as_label(), "worker failed");
    }
    result
}

fn build_runtime(flavor: RuntimeFlavor) -> std::io::Result<Runtime> {
    let mut builder = match flavor {
        RuntimeFlavor::CurrentThread => Builder::new_current_thread(),
        RuntimeFlavor::MultiThread => Builder::new_multi_thread(),
    };
    builder.enable_all().build()
}

async fn serve<F: ServiceFactory>(
    id: WorkerId,
    ctx: WorkerContext,
    factory: F,
) -> Result<(), WorkerError> {
    let mut signals = StopSignals::register()?;

    // SAFETY: the manager installed the listening socket as LISTEN_FD and
    // nothing else in this process owns it.
    let listener = unsafe { std::net::TcpListener::from_raw_fd(LISTEN_FD) };
    listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(listener)?;

    let info = WorkerInfo {
        id,
        manager_pid: ctx.manager_pid,
        options: ctx.options,
    };
    let service = factory.create(&info).await.map_err(WorkerError::Boot)?;

    let shutdown = CancellationToken::new();
    let stopper = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let name = signals.recv().await;
            info!(worker_id = id.get(), signal = name, "worker stopping");
            shutdown.cancel();
        }
    });

    info!(worker_id = id.get(), pid = std::process::id(), "worker serving");
    let result = serve_then_close(&service, listener, shutdown).await;
    stopper.abort();
    result
}

/// Binds `options.bind` and serves one service in the current process until
/// `shutdown` is cancelled. No manager, no pool, no restarts.
///
/// The service sees [`WorkerId::FIRST`] and the current pid as its manager.
pub async fn serve_in_process<F: ServiceFactory>(
    options: RunnerOptions,
    factory: F,
    shutdown: CancellationToken,
) -> Result<(), WorkerError> {
    let listener = TcpListener::bind(&options.bind).await?;
    let info = WorkerInfo {
        id: WorkerId::FIRST,
        manager_pid: std::process::id(),
        options,
    };
    let service = factory.create(&info).await.map_err(WorkerError::Boot)?;
    info!(bind = %info.options.bind, "serving in process");
    serve_then_close(&service, listener, shutdown).await
}

async fn serve_then_close<S: Service>(
    service: &S,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), WorkerError> {
    let served = service.serve(listener, shutdown.clone()).await;
    shutdown.cancel();

    let closed = service.close().await;
    served.map_err(WorkerError::Serve)?;
    closed.map_err(WorkerError::Serve)
}
