//! # Supervisor configuration.
//!
//! [`SupervisorConfig`] groups the knobs of one supervisor; everything that
//! must reach the manager process lives in [`RunnerOptions`](crate::RunnerOptions)
//! instead.
//!
//! ## Sentinel values
//! - `terminate_timeout = 0s` → wait for the manager forever after SIGTERM (no SIGKILL)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::launch::ManagerCommand;
use crate::policies::BackoffPolicy;

/// Configuration of a [`Supervisor`](crate::Supervisor).
///
/// ## Field semantics
/// - `backoff`: delay before every relaunch (default fixed 10s)
/// - `terminate_timeout`: SIGTERM → SIGKILL escalation on cancellation (`0s` = never escalate)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `command`: program hosting the manager role (default: current executable)
///
/// All fields are public; prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Relaunch delay policy.
    pub backoff: BackoffPolicy,

    /// How long a cancelled supervisor waits after SIGTERM before SIGKILL.
    pub terminate_timeout: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Program (and leading arguments) that runs the manager role.
    pub command: ManagerCommand,
}

impl SupervisorConfig {
    /// Returns the terminate timeout as an `Option` (`None` = wait forever).
    #[inline]
    pub fn terminate_grace(&self) -> Option<Duration> {
        if self.terminate_timeout == Duration::ZERO {
            None
        } else {
            Some(self.terminate_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// - `backoff = BackoffPolicy::default()` (fixed 10s)
    /// - `terminate_timeout = 30s`
    /// - `bus_capacity = 1024`
    /// - `command = ManagerCommand::current_exe()`
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            terminate_timeout: Duration::from_secs(30),
            bus_capacity: 1024,
            command: ManagerCommand::current_exe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let mut cfg = SupervisorConfig::default();
        assert_eq!(cfg.terminate_grace(), Some(Duration::from_secs(30)));
        cfg.terminate_timeout = Duration::ZERO;
        assert_eq!(cfg.terminate_grace(), None);
        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
