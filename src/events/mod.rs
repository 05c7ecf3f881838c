//! Supervisor events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the supervision loop (`core::actor`), the launcher call
//!   sites, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `SubscriberSet` listener spawned by
//!   [`Supervisor::start`](crate::Supervisor::start) and any receiver obtained
//!   from [`SupervisorHandle::subscribe`](crate::SupervisorHandle::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
