//! Restart delay policies.
//!
//! The supervisor restarts its manager indefinitely; these knobs only decide
//! **how long** it waits before each relaunch.
//!
//! ## Contents
//! - [`BackoffPolicy`] delay before relaunch number `n` (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized restarts
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → fixed 10s, no jitter.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
