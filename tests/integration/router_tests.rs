//! CommandRouter against a recording transport: subscription replay,
//! live subscribes and message dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lightctl::app::ports::QoS;
use lightctl::app::router::{CommandRouter, callback};

use crate::mock_hw::MockTransport;

fn router() -> CommandRouter<MockTransport> {
    CommandRouter::new(MockTransport::default())
}

#[test]
fn reconnect_resubscribes_exact_topic_set_once_each() {
    let r = router();
    let shared = callback(|_| {});
    for _ in 0..3 {
        r.subscribe("home/lights/desk/power", shared.clone());
    }
    r.subscribe("home/lights/desk/power", callback(|_| {}));
    r.subscribe("home/lights/desk/color", callback(|_| {}));
    r.subscribe("home/lights/desk/brightness", callback(|_| {}));

    // Nothing goes out before the first connect.
    assert!(r.transport().subscribed().is_empty());

    for _ in 0..2 {
        r.transport().clear_subscribes();
        r.on_connected();
        let mut subscribed = r.transport().subscribed();
        subscribed.sort();
        assert_eq!(
            subscribed,
            vec![
                "home/lights/desk/brightness",
                "home/lights/desk/color",
                "home/lights/desk/power",
            ]
        );
        r.on_disconnected();
        assert!(!r.is_connected());
    }
    assert_eq!(r.handler_count("home/lights/desk/power"), 2);
}

#[test]
fn subscribe_while_connected_goes_live() {
    let r = router();
    r.on_connected();
    r.subscribe("a/b/power", callback(|_| {}));
    assert_eq!(r.transport().subscribed(), vec!["a/b/power"]);
}

#[test]
fn dispatch_only_hits_matching_topic() {
    let r = router();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    r.subscribe(
        "a/b/power",
        callback(move |payload| {
            assert_eq!(payload, b"ON");
            h.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(r.on_message("a/b/power", b"ON"), 1);
    assert_eq!(r.on_message("a/b/color", b"ON"), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn callback_may_register_more_topics() {
    // Handlers run outside the table lock, so re-entrant subscribes work.
    let r = Arc::new(router());
    let inner = Arc::clone(&r);
    r.subscribe(
        "setup",
        callback(move |_| inner.subscribe("late/topic", callback(|_| {}))),
    );
    r.on_message("setup", b"");
    assert_eq!(r.topic_count(), 2);
}

#[test]
fn publish_is_forwarded_verbatim() {
    let r = router();
    r.publish("home/motion/hall", b"ON", QoS::AtMostOnce, false).unwrap();
    let sent = r.transport().published();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].topic, "home/motion/hall");
    assert_eq!(sent[0].payload, b"ON");
    assert_eq!(sent[0].qos, QoS::AtMostOnce);
    assert!(!sent[0].retain);
}
