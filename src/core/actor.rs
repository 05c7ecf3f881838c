//! # Supervision loop.
//!
//! Owns one live manager at a time and relaunches it forever.
//!
//! ## Architecture
//! ```text
//! Supervisor::start() ── launch #1 ok ──► SupervisorActor::run(process)
//!
//! loop {
//!   ├─► Supervising: select! { cancel → terminate + reap → Cancelled
//!   │                          exit   → publish ManagerExited }
//!   ├─► Reporting:   handler.on_error(Exit(reason))       (panics caught)
//!   └─► loop {
//!         ├─► Backoff:   publish BackoffScheduled, sleep(backoff.next(streak))
//!         │              (cancel → Cancelled)
//!         ├─► Launching: publish LaunchStarting, launch_until_cancelled()
//!         │     ├─ Ready     → publish ManagerReady, break
//!         │     ├─ Cancelled → terminate + reap → Cancelled
//!         │     └─ Err       → publish LaunchFailed, handler.on_error(Restart(e)), streak += 1
//!       }
//! }
//! ```
//!
//! ## Rules
//! - At most one manager is live per actor.
//! - The attempt counter increments on each launch and never resets.
//! - The failure streak resets whenever a manager becomes ready.
//! - Cancellation is observed in every state; a half-started manager is terminated and reaped.

use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::watch;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::SupervisorConfig;
use super::handler::ErrorHandler;
use super::state::{SupervisorState, SupervisorStatus};
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::launch::{self, Launched, ManagerProcess, ProcessState};
use crate::options::RunnerOptions;

pub(crate) struct SupervisorActor {
    pub cfg: SupervisorConfig,
    pub options: RunnerOptions,
    pub bus: Bus,
    pub handler: Arc<dyn ErrorHandler>,
    pub status: watch::Sender<SupervisorStatus>,
}

impl SupervisorActor {
    /// Runs until `cancel` fires; on return no manager process remains.
    pub async fn run(self, first: ManagerProcess, cancel: CancellationToken) {
        let mut attempt: u32 = 1;
        let mut process = first;

        loop {
            process.advance(ProcessState::Running);
            let pid = process.pid();
            self.set(SupervisorState::Supervising, Some(pid), attempt);

            let exited = select! {
                biased;
                _ = cancel.cancelled() => None,
                res = process.wait() => Some(res),
            };
            let Some(exited) = exited else {
                self.terminate(process).await;
                return;
            };

            self.set(SupervisorState::Reporting, None, attempt);
            let err = match exited {
                Ok(reason) => {
                    self.bus.publish(
                        Event::new(EventKind::ManagerExited)
                            .with_pid(pid)
                            .with_reason(reason.to_string()),
                    );
                    SupervisorError::Exit(reason)
                }
                Err(e) => {
                    // The process is in an unknown state; do not leave it running.
                    if let Err(kill_err) = process.signal(Signal::SIGKILL) {
                        warn!(pid, error = %kill_err, "failed to kill unwaitable manager");
                    }
                    SupervisorError::Wait(e)
                }
            };
            let mut reason = err.to_string();
            self.report(&err);

            let mut streak: u32 = 0;
            process = loop {
                let delay = self.cfg.backoff.next(streak);
                attempt = attempt.saturating_add(1);
                self.set(SupervisorState::Backoff, None, attempt);
                self.bus.publish(
                    Event::new(EventKind::BackoffScheduled)
                        .with_attempt(attempt)
                        .with_delay(delay)
                        .with_reason(reason.as_str()),
                );

                select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.set(SupervisorState::Cancelled, None, attempt);
                        self.bus.publish(Event::new(EventKind::SupervisorStopped));
                        return;
                    }
                    _ = time::sleep(delay) => {}
                }

                self.set(SupervisorState::Launching, None, attempt);
                self.bus
                    .publish(Event::new(EventKind::LaunchStarting).with_attempt(attempt));

                match launch::launch_until_cancelled(&self.cfg.command, &self.options, &cancel).await {
                    Ok(Launched::Cancelled(half_started)) => {
                        self.terminate(half_started).await;
                        return;
                    }
                    Ok(Launched::Ready(next)) => {
                        self.bus.publish(
                            Event::new(EventKind::ManagerReady)
                                .with_attempt(attempt)
                                .with_pid(next.pid()),
                        );
                        break next;
                    }
                    Err(e) => {
                        self.bus.publish(
                            Event::new(EventKind::LaunchFailed)
                                .with_attempt(attempt)
                                .with_reason(e.to_string()),
                        );
                        let err = SupervisorError::Restart(e);
                        reason = err.to_string();
                        self.report(&err);
                        streak = streak.saturating_add(1);
                    }
                }
            };
        }
    }

    /// SIGTERM the live manager, escalate after the terminate timeout, reap.

    async fn terminate(&self, mut process: ManagerProcess) {
        let pid = process.pid();
        self.bus
            .publish(Event::new(EventKind::ManagerTerminating).with_pid(pid));

        let grace = self.cfg.terminate_grace();
        let stopped = Event::new(EventKind::SupervisorStopped).with_pid(pid);
        let stopped = match process.terminate(grace).await {
            Ok(outcome) => {
                if outcome.killed {
                    let mut killed = Event::new(EventKind::ManagerKilled).with_pid(pid);
                    if let Some(limit) = grace {
                        killed = killed.with_timeout(limit);
                    }
                    self.bus.publish(killed);
                }
                stopped.with_reason(outcome.exit.to_string())
            }
            Err(e) => {
                warn!(pid, error = %e, "failed to terminate manager");
                stopped.with_reason(e.to_string())
            }
        };

        // The read guard must be gone before `set` takes the write lock.
        let attempt = self.status.borrow().attempt;
        self.set(SupervisorState::Cancelled, None, attempt);
        self.bus.publish(stopped);
    }

    /// Invokes the error handler; a panic inside it is swallowed.
    fn report(&self, err: &SupervisorError) {
        let handler = &self.handler;
        let call = std::panic::AssertUnwindSafe(|| handler.on_error(err));
        if std::panic::catch_unwind(call).is_err() {
            debug!(label = err.as_label(), "error handler panicked; ignored");
        }
    }

    fn set(&self, state: SupervisorState, pid: Option<u32>, attempt: u32) {
        self.status.send_replace(SupervisorStatus {
            state,
            pid,
            attempt,
        });
    }
}
