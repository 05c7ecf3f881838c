//! Body of the manager process.

use std::ffi::OsString;
use std::net::TcpListener;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::pin::pin;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::OrphanMonitor;
use crate::envelope;
use crate::error::{ExitReason, ManagerError};
use crate::launch::{ManagerContext, ReadinessNotifier, inherit_fd};
use crate::options::RunnerOptions;
use crate::os_signals::StopSignals;
use crate::worker::{
    DesiredWorkers, LISTEN_FD, SpawnHooks, WORKER_BOOT_ERROR, WORKER_VERB, WorkerContext,
    WorkerId, WorkerIdentityAllocator, WorkerSlot, WorkerTable,
};

/// Runs the manager role until a graceful stop or a fatal error.
///
/// `prefix` holds the arguments that preceded the `run` verb; workers are
/// spawned from the same executable with the same prefix.
pub fn run<H: SpawnHooks>(token: &str, prefix: Vec<OsString>, hooks: H) -> Result<(), ManagerError> {
    WorkerId::ensure_unset()?;
    let ctx: ManagerContext = envelope::decode(token)?;
    // SAFETY: the launcher installed the readiness pipe under this number.
    let notifier = unsafe { ReadinessNotifier::from_fd(ctx.ready_fd) }?;

    let monitor = OrphanMonitor::start(ctx.options.root_pid)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let mut manager = Manager::new(ctx.options, prefix, hooks)?;
        manager.run(notifier).await
    });
    drop(runtime);
    monitor.stop();

    if let Err(e) = &result {
        error!(error = %e, label = e.as_label(), "manager failed");
    }
    result
}

struct Reaped {
    id: WorkerId,
    pid: u32,
    exit: std::io::Result<ExitReason>,
}

struct Manager<H> {
    options: RunnerOptions,
    exe: PathBuf,
    prefix: Vec<OsString>,
    worker_token: String,
    listener: TcpListener,
    table: WorkerTable,
    allocator: WorkerIdentityAllocator,
    hooks: H,
    reaped_tx: mpsc::UnboundedSender<Reaped>,
    reaped_rx: mpsc::UnboundedReceiver<Reaped>,
}

impl<H: SpawnHooks> Manager<H> {
    fn new(options: RunnerOptions, prefix: Vec<OsString>, hooks: H) -> Result<Self, ManagerError> {
        let listener = TcpListener::bind(&options.bind).map_err(|source| ManagerError::Bind {
            addr: options.bind.clone(),
            source,
        })?;
        let worker_token = envelope::encode(&WorkerContext {
            options: options.clone(),
            manager_pid: std::process::id(),
        })?;
        let allocator = WorkerIdentityAllocator::new(DesiredWorkers::new(options.worker_count()));
        let (reaped_tx, reaped_rx) = mpsc::unbounded_channel();

        Ok(Self {
            exe: std::env::current_exe()?,
            options,
            prefix,
            worker_token,
            listener,
            table: WorkerTable::new(),
            allocator,
            hooks,
            reaped_tx,
            reaped_rx,
        })
    }

    async fn run(&mut self, notifier: ReadinessNotifier) -> Result<(), ManagerError> {
        let mut stop = StopSignals::register_with_quit()?;
        let mut sigttin = signal(SignalKind::from_raw(libc::SIGTTIN))?;
        let mut sigttou = signal(SignalKind::from_raw(libc::SIGTTOU))?;

        let outcome = self.supervise(notifier, &mut stop, &mut sigttin, &mut sigttou).await;
        self.graceful_stop().await;
        outcome
    }

    async fn supervise(
        &mut self,
        notifier: ReadinessNotifier,
        stop: &mut StopSignals,
        sigttin: &mut tokio::signal::unix::Signal,
        sigttou: &mut tokio::signal::unix::Signal,
    ) -> Result<(), ManagerError> {
        self.fill()?;
        notifier.notify()?;
        info!(
            pid = std::process::id(),
            bind = %self.options.bind,
            workers = self.table.len(),
            "manager ready"
        );

        loop {
            tokio::select! {
                Some(reaped) = self.reaped_rx.recv() => self.on_reaped(reaped)?,
                _ = sigttin.recv() => {
                    let desired = self.allocator.desired().increment();
                    info!(desired, "scaling up");
                    self.fill()?;
                }
                _ = sigttou.recv() => {
                    let desired = self.allocator.desired().decrement();
                    info!(desired, "scaling down");
                    for slot in self.table.retire_excess(desired) {
                        send(&slot, Signal::SIGTERM);
                    }
                }
                name = stop.recv() => {
                    info!(signal = name, "manager stopping");
                    return Ok(());
                }
            }
        }
    }

    fn on_reaped(&mut self, reaped: Reaped) -> Result<(), ManagerError> {
        let Some(slot) = self.table.remove(reaped.id, reaped.pid) else {
            return Ok(());
        };
        match reaped.exit {
            Ok(ExitReason::Code(WORKER_BOOT_ERROR)) => {
                error!(worker_id = slot.id.get(), pid = slot.pid, "worker failed to boot");
                return Err(ManagerError::WorkerBoot {
                    worker_id: slot.id.get(),
                });
            }
            Ok(exit) if slot.retiring => {
                info!(worker_id = slot.id.get(), pid = slot.pid, %exit, "worker retired");
            }
            Ok(exit) => {
                warn!(worker_id = slot.id.get(), pid = slot.pid, %exit, "worker exited");
            }
            Err(e) => {
                warn!(worker_id = slot.id.get(), pid = slot.pid, error = %e, "lost track of worker");
            }
        }
        self.fill()
    }

    /// Spawns workers until every id in `1..=desired` is held.
    fn fill(&mut self) -> Result<(), ManagerError> {
        let desired = self.allocator.desired().get();
        while self.table.iter().filter(|s| s.id.get() as usize <= desired).count() < desired {
            self.spawn_worker()?;
        }
        Ok(())
    }

    fn spawn_worker(&mut self) -> Result<(), ManagerError> {
        let id = self.allocator.allocate(&self.table)?;
        self.hooks.pre_spawn(id);

        let mut cmd = Command::new(&self.exe);
        cmd.args(&self.prefix).arg(WORKER_VERB).arg(&self.worker_token);
        id.apply_to(&mut cmd);
        inherit_fd(&mut cmd, self.listener.as_raw_fd(), LISTEN_FD);

        let mut child = cmd.spawn().map_err(ManagerError::SpawnWorker)?;
        let pid = child.id().unwrap_or_default();
        self.table.insert(id, pid);
        self.hooks.post_spawn(id, pid);
        debug!(worker_id = id.get(), pid, "worker spawned");

        let tx = self.reaped_tx.clone();
        tokio::spawn(async move {
            let exit = child.wait().await.map(ExitReason::from);
            let _ = tx.send(Reaped { id, pid, exit });
        });
        Ok(())
    }

    /// SIGTERM every worker, SIGKILL whoever is left after the graceful timeout.
    async fn graceful_stop(&mut self) {
        for slot in self.table.iter() {
            send(slot, Signal::SIGTERM);
        }

        let mut deadline = pin!(tokio::time::sleep(self.options.graceful_timeout()));
        while !self.table.is_empty() {
            tokio::select! {
                Some(r) = self.reaped_rx.recv() => { self.table.remove(r.id, r.pid); }
                _ = &mut deadline => break,
            }
        }

        if !self.table.is_empty() {
            warn!(remaining = self.table.len(), "workers ignored SIGTERM, killing");
            for slot in self.table.iter() {
                send(slot, Signal::SIGKILL);
            }
            while !self.table.is_empty() {
                match self.reaped_rx.recv().await {
                    Some(r) => {
                        self.table.remove(r.id, r.pid);
                    }
                    None => break,
                }
            }
        }
        info!("all workers stopped");
    }
}

fn send(slot: &WorkerSlot, sig: Signal) {
    match signal::kill(Pid::from_raw(slot.pid as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(worker_id = slot.id.get(), pid = slot.pid, error = %e, "failed to signal worker"),
    }
}
