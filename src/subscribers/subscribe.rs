//! # Subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into
//! the supervisor. Each subscriber is driven by a dedicated worker task fed by
//! a bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they do **not** block the supervision loop
//!   nor other subscribers.
//! - On queue overflow, events for that subscriber are **dropped** and a
//!   `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use poolvisor::{Event, EventKind, Subscribe};
//!
//! struct RestartCounter(std::sync::atomic::AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for RestartCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ManagerExited {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "restart-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
