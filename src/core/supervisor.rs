//! # Supervisor: launches the manager and keeps it alive.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`] and the
//! [`SupervisorConfig`]. [`Supervisor::start`] performs the first launch in
//! the caller's task, then hands the live manager to a background supervision
//! loop and returns a [`SupervisorHandle`].
//!
//! ## Architecture
//! ```text
//! Supervisor::start(options)
//!   ├─► launch #1 ── Err ──► returned to caller (not retried)
//!   └─► Ok(process)
//!         └─► tokio::spawn {
//!               SupervisorActor::run(process, cancel)     (publishes Events)
//!               stop listener, drain SubscriberSet
//!             }
//!
//! Event flow:
//!   SupervisorActor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit_arc
//!                                          └────► SupervisorHandle::subscribe()
//!
//! Shutdown:
//!   SupervisorHandle::shutdown() ─► cancel ─► SIGTERM manager ─► reap ─► Cancelled
//!   drop(SupervisorHandle)       ─► cancel (the loop still reaps in the background)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use poolvisor::{LogWriter, RunnerOptions, Supervisor, SupervisorConfig, SupervisorError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = Supervisor::new(SupervisorConfig::default())
//!         .with_subscriber(Arc::new(LogWriter::new()))
//!         .with_error_handler(|err: &SupervisorError| eprintln!("{err}"))
//!         .start(RunnerOptions::new("0.0.0.0:8080").with_workers(4))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::actor::SupervisorActor;
use super::config::SupervisorConfig;
use super::handler::{ErrorHandler, LogErrors};
use super::state::{SupervisorState, SupervisorStatus};
use crate::error::LaunchError;
use crate::events::{Bus, Event, EventKind};
use crate::launch;
use crate::options::RunnerOptions;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder and entry point of a supervised manager.
pub struct Supervisor {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handler: Arc<dyn ErrorHandler>,
}

impl Supervisor {
    /// Creates a supervisor that logs errors and has no subscribers.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            handler: Arc::new(LogErrors),
        }
    }

    /// Adds an event subscriber.
    pub fn with_subscriber(mut self, sub: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(sub);
        self
    }

    /// Replaces the error handler.
    pub fn with_error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Launches the manager and, once it is ready, starts supervising it.
    ///
    /// A failure of this first launch is returned and not retried.
    pub async fn start(self, options: RunnerOptions) -> Result<SupervisorHandle, LaunchError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (status, status_rx) = watch::channel(SupervisorStatus {
            state: SupervisorState::Launching,
            pid: None,
            attempt: 1,
        });

        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let done = CancellationToken::new();
        let listener = spawn_listener(bus.subscribe(), subs, done.clone());

        bus.publish(Event::new(EventKind::LaunchStarting).with_attempt(1));
        let process = match launch::launch(&self.cfg.command, &options).await {
            Ok(process) => process,
            Err(e) => {
                bus.publish(
                    Event::new(EventKind::LaunchFailed)
                        .with_attempt(1)
                        .with_reason(e.to_string()),
                );
                done.cancel();
                let _ = listener.await;
                return Err(e);
            }
        };
        bus.publish(
            Event::new(EventKind::ManagerReady)
                .with_attempt(1)
                .with_pid(process.pid()),
        );
        status.send_replace(SupervisorStatus {
            state: SupervisorState::Supervising,
            pid: Some(process.pid()),
            attempt: 1,
        });

        let cancel = CancellationToken::new();
        let actor = SupervisorActor {
            cfg: self.cfg,
            options,
            bus: bus.clone(),
            handler: self.handler,
            status,
        };
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                actor.run(process, cancel).await;
                done.cancel();
                let _ = listener.await;
            }
        });

        Ok(SupervisorHandle {
            cancel,
            status: status_rx,
            bus,
            task: Some(task),
        })
    }
}

/// Forwards bus events to the subscriber set until `done`, then drains both.
fn spawn_listener(
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    done: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => subs.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = done.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        subs.emit_arc(Arc::new(ev));
                    }
                    break;
                }
            }
        }
        subs.shutdown().await;
    })
}

/// Control handle of a running supervisor.
///
/// Dropping the handle cancels supervision; the background loop still
/// terminates and reaps the manager.
pub struct SupervisorHandle {
    cancel: CancellationToken,
    status: watch::Receiver<SupervisorStatus>,
    bus: Bus,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Current phase of the loop.
    pub fn state(&self) -> SupervisorState {
        self.status.borrow().state
    }

    /// Pid of the live manager, if any.
    pub fn pid(&self) -> Option<u32> {
        self.status.borrow().pid
    }

    /// Full status snapshot.
    pub fn status(&self) -> SupervisorStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn watch(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    /// Subscribes to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Requests cancellation without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels supervision and waits until the manager is reaped and every
    /// subscriber has seen the final event.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "supervision task failed");
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
