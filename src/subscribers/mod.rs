//! # Event subscribers.
//!
//! ## Architecture
//! ```text
//! supervision loop ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                 │
//!                                                  ┌──────────────┼──────────────┐
//!                                                  ▼              ▼              ▼
//!                                              [queue 1]      [queue 2]      [queue N]
//!                                                  ▼              ▼              ▼
//!                                              LogWriter       metrics         custom
//! ```
//!
//! Implement [`Subscribe`] to observe supervisor events; [`LogWriter`] is the
//! built-in subscriber that renders them through `tracing`.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
