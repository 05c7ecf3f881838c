//! # Events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies what happened to the supervised manager:
//! - **Launch events**: a launch attempt starts, succeeds or fails
//! - **Supervision events**: the manager exits, a relaunch is scheduled
//! - **Shutdown events**: cancellation, termination and final stop
//! - **Subscriber events**: a subscriber overflowed or panicked
//!
//! The [`Event`] struct carries the metadata (pid, attempt, delay, exit reason).
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases
//! monotonically; use it to restore order across subscribers.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use poolvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(10))
//!     .with_reason("exit code 1");
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.delay_ms, Some(10_000));
//! assert_eq!(ev.reason.as_deref(), Some("exit code 1"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Launch events ===
    /// A launch attempt is starting.
    ///
    /// Sets: `attempt`.
    LaunchStarting,

    /// The manager signalled readiness.
    ///
    /// Sets: `attempt`, `pid`.
    ManagerReady,

    /// The manager exited (or could not be spawned) before readiness.
    ///
    /// Sets: `attempt`, `reason`.
    LaunchFailed,

    // === Supervision events ===
    /// The running manager exited on its own.
    ///
    /// Sets: `pid`, `reason` (exit reason).
    ManagerExited,

    /// Next launch scheduled.
    ///
    /// Sets: `attempt` (the upcoming attempt), `delay_ms`, `reason` (last failure).
    BackoffScheduled,

    // === Shutdown events ===
    /// Cancellation observed while a manager was live; SIGTERM sent.
    ///
    /// Sets: `pid`.
    ManagerTerminating,

    /// The manager did not exit within the terminate timeout; SIGKILL sent.
    ///
    /// Sets: `pid`, `timeout_ms`.
    ManagerKilled,

    /// The supervisor stopped; no manager remains.
    ///
    /// Sets: `pid` (last manager, if any), `reason` (its exit reason, if any).
    SupervisorStopped,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `subscriber`, `reason`.
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subscriber`, `reason`.
    SubscriberOverflow,
}

impl EventKind {
    /// True for events that report on subscribers rather than on the manager.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(self, EventKind::SubscriberPanicked | EventKind::SubscriberOverflow)
    }
}

/// Supervisor event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Manager pid, if applicable.
    pub pid: Option<u32>,
    /// Launch attempt (starting from 1).
    pub attempt: Option<u32>,
    /// Relaunch delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Terminate timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (exit reason, error message, overflow cause).
    pub reason: Option<Arc<str>>,
    /// Subscriber name (subscriber events only).
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pid: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches a manager pid.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a launch attempt.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a relaunch delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a terminate timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::LaunchStarting);
        let b = Event::new(EventKind::ManagerReady);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn huge_delay_is_clamped() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn subscriber_events_carry_name() {
        let ev = Event::subscriber_overflow("log", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.subscriber, Some("log"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
    }
}
