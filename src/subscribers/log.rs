//! # LogWriter: events rendered through `tracing`
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  poolvisor: launching manager attempt=1
//! INFO  poolvisor: manager ready attempt=1 pid=4242
//! WARN  poolvisor: manager exited pid=4242 reason="exit code 1"
//! INFO  poolvisor: relaunch scheduled attempt=2 delay_ms=10000
//! INFO  poolvisor: supervisor stopped pid=4301
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every event with structured fields.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::LaunchStarting => {
                info!(target: "poolvisor", attempt = e.attempt, "launching manager");
            }
            EventKind::ManagerReady => {
                info!(target: "poolvisor", attempt = e.attempt, pid = e.pid, "manager ready");
            }
            EventKind::LaunchFailed => {
                error!(target: "poolvisor", attempt = e.attempt, reason, "manager launch failed");
            }
            EventKind::ManagerExited => {
                warn!(target: "poolvisor", pid = e.pid, reason, "manager exited");
            }
            EventKind::BackoffScheduled => {
                info!(
                    target: "poolvisor",
                    attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    reason,
                    "relaunch scheduled"
                );
            }
            EventKind::ManagerTerminating => {
                info!(target: "poolvisor", pid = e.pid, "terminating manager");
            }
            EventKind::ManagerKilled => {
                warn!(
                    target: "poolvisor",
                    pid = e.pid,
                    timeout_ms = e.timeout_ms,
                    "manager ignored SIGTERM, killed"
                );
            }
            EventKind::SupervisorStopped => {
                info!(target: "poolvisor", pid = e.pid, reason, "supervisor stopped");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "poolvisor", subscriber = e.subscriber, reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "poolvisor", subscriber = e.subscriber, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
