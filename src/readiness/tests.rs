//! Unit tests for the readiness bus.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::{ReadinessBus, Topic};
use crate::resource::ResourceKind;

fn topic(names: &[&str]) -> Topic { Topic::new(ResourceKind::Script, names) }

fn counter_callback(count: &Arc<AtomicUsize>) -> super::ReadyFn {
    let count = Arc::clone(count);
    Box::new(move || {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn topic_sorts_names_into_canonical_order() {
    assert_eq!(topic(&["b", "a"]), topic(&["a", "b"]));
    assert_eq!(topic(&["b", "a"]).names(), ["a", "b"]);
    assert_eq!(topic(&["a", "b"]).to_string(), "script:a|b");
}

#[test]
fn publish_fires_subscribers_in_subscription_order() {
    let bus = ReadinessBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        bus.subscribe(topic(&["a"]), Box::new(move || order.lock().expect("order").push(label)));
    }

    bus.publish(&topic(&["a"]));
    assert_eq!(*order.lock().expect("order"), ["first", "second", "third"]);
}

#[test]
fn publish_does_not_clear_subscriptions() {
    let bus = ReadinessBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    bus.subscribe(topic(&["a"]), counter_callback(&count));

    bus.publish(&topic(&["a"]));
    bus.publish(&topic(&["a"]));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn flush_fires_then_drops_subscriptions() {
    let bus = ReadinessBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    bus.subscribe(topic(&["a"]), counter_callback(&count));

    bus.flush(&topic(&["a"]));
    bus.flush(&topic(&["a"]));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(bus.topics().is_empty());
}

#[test]
fn unsubscribe_detaches_a_single_callback() {
    let bus = ReadinessBus::new();
    let kept = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    bus.subscribe(topic(&["a"]), counter_callback(&kept));
    let id = bus.subscribe(topic(&["a"]), counter_callback(&dropped));

    bus.unsubscribe(&topic(&["a"]), id);
    bus.publish(&topic(&["a"]));
    assert_eq!(kept.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
}

#[test]
fn unsubscribe_tolerates_unknown_topic_and_id() {
    let bus = ReadinessBus::new();
    let id = bus.subscribe(topic(&["a"]), Box::new(|| {}));
    bus.unsubscribe(&topic(&["missing"]), id);
    bus.unsubscribe(&topic(&["a"]), id);
    bus.unsubscribe(&topic(&["a"]), id);
}

#[test]
fn reentrant_publish_uses_a_stable_snapshot() {
    let bus = Arc::new(ReadinessBus::new());
    let count = Arc::new(AtomicUsize::new(0));

    let inner_bus = Arc::clone(&bus);
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_inner = Arc::clone(&fired);
    bus.subscribe(
        topic(&["a"]),
        Box::new(move || {
            // Re-entrant publish of another topic must not disturb the
            // in-progress snapshot.
            if fired_inner.fetch_add(1, Ordering::SeqCst) == 0 {
                inner_bus.publish(&topic(&["b"]));
            }
        }),
    );
    bus.subscribe(topic(&["a"]), counter_callback(&count));
    bus.subscribe(topic(&["b"]), counter_callback(&count));

    bus.publish(&topic(&["a"]));
    // Both the second "a" subscriber and the "b" subscriber fired once.
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn resubscribe_during_flush_survives_for_the_next_transition() {
    let bus = Arc::new(ReadinessBus::new());
    let count = Arc::new(AtomicUsize::new(0));

    let resub_bus = Arc::clone(&bus);
    let resub_count = Arc::clone(&count);
    bus.subscribe(
        topic(&["a"]),
        Box::new(move || {
            resub_count.fetch_add(1, Ordering::SeqCst);
            let next = counter_callback(&resub_count);
            resub_bus.subscribe(topic(&["a"]), next);
        }),
    );

    bus.flush(&topic(&["a"]));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    bus.flush(&topic(&["a"]));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn clear_drops_without_firing() {
    let bus = ReadinessBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    bus.subscribe(topic(&["a"]), counter_callback(&count));

    bus.clear(&topic(&["a"]));
    bus.publish(&topic(&["a"]));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
