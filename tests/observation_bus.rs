use cowstore::observation::bus::ObservationBus;
use cowstore::observation::event::{Event, EventKind};
use cowstore::types::Key;

fn event(datastore: &str, kind: EventKind, version: u64) -> Event {
    Event { datastore: datastore.to_string(), kind, instance_key: Key::Str("k".into()), committed_version: version }
}

#[tokio::test]
async fn a_late_subscriber_never_sees_events_published_before_it_subscribed() {
    let bus = ObservationBus::default();
    bus.publish(event("users", EventKind::Created, 1));

    let mut late = bus.subscribe("users");
    bus.publish(event("users", EventKind::Updated, 2));

    let received = late.recv().await.unwrap();
    assert_eq!(received.committed_version, 2);
    assert_eq!(received.kind, EventKind::Updated);
}

#[tokio::test]
async fn multiple_subscribers_to_the_same_datastore_each_get_every_event() {
    let bus = ObservationBus::default();
    let mut a = bus.subscribe("users");
    let mut b = bus.subscribe("users");

    bus.publish(event("users", EventKind::Created, 1));
    bus.publish(event("users", EventKind::Deleted, 2));

    for sub in [&mut a, &mut b] {
        assert_eq!(sub.recv().await.unwrap().committed_version, 1);
        assert_eq!(sub.recv().await.unwrap().committed_version, 2);
    }
}
