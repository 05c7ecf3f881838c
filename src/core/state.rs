//! # Observable supervisor state.
//!
//! ```text
//!             ┌──────────────────────────────────────────────┐
//!             ▼                                              │
//! Launching ──► Supervising ──► Reporting ──► Backoff ──► Launching
//!                   │                            │
//!                   └──────────► Cancelled ◄─────┘
//! ```

/// Phase of the supervision loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// A launch attempt is in progress.
    Launching,
    /// A ready manager is running; waiting for it to exit.
    Supervising,
    /// The manager exited; the error handler is running.
    Reporting,
    /// Waiting before the next launch attempt.
    Backoff,
    /// Cancelled; no manager remains. Terminal.
    Cancelled,
}

/// Snapshot published on the supervisor's watch channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// Current phase.
    pub state: SupervisorState,
    /// Pid of the live manager, if any.
    pub pid: Option<u32>,
    /// Launch attempt counter (starts at 1, never resets).
    pub attempt: u32,
}
