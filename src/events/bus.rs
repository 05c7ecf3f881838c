//! # Event bus for supervisor events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]: the supervisor
//! loop publishes, the [`SubscriberSet`](crate::SubscriberSet) listener (and
//! anyone holding a receiver) observes.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events published with no live receiver are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for supervisor events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers (dropped if there are none).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receiver_sees_events_after_subscribe() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::LaunchStarting));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ManagerReady).with_pid(42));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ManagerReady);
        assert_eq!(ev.pid, Some(42));
    }
}
