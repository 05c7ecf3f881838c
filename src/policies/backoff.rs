//! # Delay before relaunching a manager.
//!
//! [`BackoffPolicy`] maps the number of consecutive failed launches to a delay.
//! The base delay for failure streak `n` is `first × factor^n`, clamped to
//! `max`, then jitter is applied. The base is derived from `n` alone, so jitter
//! never feeds back into later delays.
//!
//! The default is a fixed 10 second delay: every abnormal exit waits the same
//! amount of time before the next attempt, and attempts never stop.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use poolvisor::{BackoffPolicy, JitterPolicy};
//!
//! let fixed = BackoffPolicy::default();
//! assert_eq!(fixed.next(0), Duration::from_secs(10));
//! assert_eq!(fixed.next(50), Duration::from_secs(10));
//!
//! let growing = BackoffPolicy::exponential(Duration::from_millis(500), 2.0, Duration::from_secs(8));
//! assert_eq!(growing.next(0), Duration::from_millis(500));
//! assert_eq!(growing.next(3), Duration::from_secs(4));
//! assert_eq!(growing.next(9), Duration::from_secs(8));
//! # let _ = JitterPolicy::None;
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(10);

/// Relaunch delay policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first relaunch of a failure streak.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive failure (`1.0` = fixed).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Fixed 10s delay, no jitter.
    fn default() -> Self {
        Self::fixed(DEFAULT_RESTART_DELAY)
    }
}

impl BackoffPolicy {
    /// Same `delay` before every relaunch.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay growing by `factor` per consecutive failure, capped at `max`.
    pub fn exponential(first: Duration, factor: f64, max: Duration) -> Self {
        Self {
            first,
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns a copy with the given jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the next relaunch, given the number of launches that
    /// already failed in a row (`0` right after a manager exit).
    pub fn next(&self, streak: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = streak.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
