//! The observation bus: every subscriber to a datastore gets its own unbounded
//! channel, so a slow subscriber can never cause another subscriber's events to
//! be dropped (the failure mode a fixed-capacity broadcast channel has via
//! `Lagged`). Publishing never blocks a writer; a dead subscriber is pruned
//! lazily the next time its datastore publishes.

use crate::observation::event::Event;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Fan-out point for commit notifications, buffered per subscriber rather than
/// through one shared bounded channel.
#[derive(Debug, Default)]
pub struct ObservationBus {
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Event>>>>,
}

impl ObservationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event published for `datastore` from this point on.
    /// The returned receiver buffers unboundedly: nothing published to it is
    /// ever dropped, however far behind the subscriber falls.
    #[must_use]
    pub fn subscribe(&self, datastore: &str) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().entry(datastore.to_string()).or_default().push(tx);
        rx
    }

    /// Publish `event` to its datastore's subscribers. Dropped silently if
    /// nobody is listening — an unsubscribed datastore is a routine state, not
    /// an error. Senders whose receiver has already been dropped are pruned.
    pub fn publish(&self, event: Event) {
        let mut channels = self.channels.lock();
        if let Some(senders) = channels.get_mut(&event.datastore) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::event::EventKind;
    use crate::types::Key;

    fn event(datastore: &str, version: u64) -> Event {
        Event { datastore: datastore.to_string(), kind: EventKind::Created, instance_key: Key::I64(1), committed_version: version }
    }

    #[tokio::test]
    async fn subscriber_only_sees_its_own_datastore() {
        let bus = ObservationBus::default();
        let mut users = bus.subscribe("users");
        let mut orders = bus.subscribe("orders");

        bus.publish(event("users", 1));
        bus.publish(event("orders", 2));

        assert_eq!(users.recv().await.unwrap().committed_version, 1);
        assert_eq!(orders.recv().await.unwrap().committed_version, 2);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_no_op() {
        let bus = ObservationBus::default();
        bus.publish(event("users", 1));
    }

    #[tokio::test]
    async fn events_arrive_in_commit_order() {
        let bus = ObservationBus::default();
        let mut sub = bus.subscribe("users");
        for v in 1..=5 {
            bus.publish(event("users", v));
        }
        for expected in 1..=5 {
            assert_eq!(sub.recv().await.unwrap().committed_version, expected);
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_see_every_event_unbounded() {
        let bus = ObservationBus::default();
        let mut a = bus.subscribe("users");
        let mut b = bus.subscribe("users");
        for v in 1..=100 {
            bus.publish(event("users", v));
        }
        for expected in 1..=100 {
            assert_eq!(a.recv().await.unwrap().committed_version, expected);
        }
        for expected in 1..=100 {
            assert_eq!(b.recv().await.unwrap().committed_version, expected);
        }
    }

    #[tokio::test]
    async fn a_dropped_subscriber_is_pruned_without_affecting_others() {
        let bus = ObservationBus::default();
        {
            let _dropped = bus.subscribe("users");
        }
        let mut still_here = bus.subscribe("users");
        bus.publish(event("users", 1));
        assert_eq!(still_here.recv().await.unwrap().committed_version, 1);
        assert_eq!(bus.channels.lock()["users"].len(), 1);
    }
}
