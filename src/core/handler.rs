//! # Error callback.
//!
//! Every abnormal event after the initial launch (manager exit, failed
//! relaunch) is reported to an [`ErrorHandler`]. The callback runs inline in
//! the supervision loop; a panic inside it is caught and discarded.
//!
//! Closures implement the trait:
//! ```rust
//! use poolvisor::{ErrorHandler, SupervisorError};
//!
//! let handler = |err: &SupervisorError| eprintln!("manager trouble: {err}");
//! fn takes(_: impl ErrorHandler) {}
//! takes(handler);
//! ```

use tracing::error;

use crate::error::SupervisorError;

/// Receives abnormal events of a running supervisor.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Called once per abnormal event; must not block for long.
    fn on_error(&self, err: &SupervisorError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&SupervisorError) + Send + Sync + 'static,
{
    fn on_error(&self, err: &SupervisorError) {
        self(err)
    }
}

/// Default handler: logs through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogErrors;

impl ErrorHandler for LogErrors {
    fn on_error(&self, err: &SupervisorError) {
        error!(target: "poolvisor", error = %err, label = err.as_label(), "manager failure");
    }
}
