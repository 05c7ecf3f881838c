//! # Jitter for relaunch delays.
//!
//! Several supervisors started together (for example one per host behind the
//! same deploy) would otherwise relaunch their managers in lockstep after a
//! shared failure. [`JitterPolicy`] spreads those relaunches out.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[first, delay × 3]`, capped at max

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a relaunch delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as computed.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay/2, delay]`.
    Equal,
    /// Uniform in `[floor, delay × 3]`, capped; see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` needs a floor and a cap and is returned unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => full(delay),
            JitterPolicy::Equal => equal(delay),
        }
    }

    /// Decorrelated jitter: uniform in `[floor, min(delay × 3, max)]`.
    ///
    /// Other policies fall back to [`apply`](Self::apply)`(delay)`.
    pub fn apply_decorrelated(&self, floor: Duration, delay: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(delay);
        }

        let floor_ms = floor.as_millis() as u64;
        let upper = (delay.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(floor_ms);

        if floor_ms >= upper {
            return floor;
        }
        Duration::from_millis(rand::rng().random_range(floor_ms..=upper))
    }
}

fn full(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

fn equal(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    let half = ms / 2;
    if half == 0 {
        return delay;
    }
    Duration::from_millis(half + rand::rng().random_range(0..=(ms - half)))
}
