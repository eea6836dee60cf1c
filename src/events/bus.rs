//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that components can publish
//! without blocking and without knowing who listens.
//!
//! ```text
//! Publishers (many):                    Receivers:
//!   ReconnectSupervisor ──┐
//!   SessionMonitor      ──┼──► Bus ──┬──► run listener ──► SubscriberSet ──► LogWriter, ...
//!   payload::run_once   ──┤          └──► Service::subscribe_events() receivers
//!   Lifecycle           ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks; events sent while nobody listens are dropped.
//! - A single ring buffer of `capacity` events is shared by all receivers.
//! - Receivers that fall behind get `RecvError::Lagged(n)` and skip `n` events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver observing events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_published_after_subscribing() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::Stopped));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ConnectAttempt).with_attempt(1));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ConnectAttempt);
        assert_eq!(ev.attempt, Some(1));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = Bus::new(0);
        let _rx = bus.subscribe();
        bus.publish(Event::new(EventKind::Stopped));
        assert_eq!(bus.receiver_count(), 1);
    }
}
