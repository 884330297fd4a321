//! Subscription, payloads and muting.

use std::sync::{Arc, Mutex};

use rowset::{Event, EventKind, Position, Value};

use crate::helpers::*;

#[test]
fn mutations_emit_their_payloads() {
    let mut set = flat_store();
    let log = EventLog::new();
    log.attach(&mut set);

    set.add(recs(serde_json::json!([{"id": 1, "v": "a"}])))
        .expect("add");
    set.update(recs(serde_json::json!([{"id": 1, "v": "b"}])))
        .expect("update");
    set.remove(&[id(1)]);

    let events: Vec<Event> = log.take().into_iter().map(|(event, _)| event).collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], Event::Add { items: vec![id(1)] });
    match &events[1] {
        Event::Update { items, data } => {
            assert_eq!(items, &vec![id(1)]);
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].get("v"), Some(&Value::Str("b".into())));
        }
        other => panic!("expected update, got {other:?}"),
    }
    assert_eq!(events[2], Event::Remove { items: vec![id(1)] });
}

#[test]
fn exact_subscribers_fire_before_wildcards_in_registration_order() {
    let mut set = flat_store();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let trace = |tag: &'static str, calls: &Arc<Mutex<Vec<&'static str>>>| {
        let calls = Arc::clone(calls);
        move |_: &Event, _: Option<&str>| calls.lock().unwrap().push(tag)
    };
    set.on(EventKind::Any, trace("wildcard-1", &calls));
    set.on(EventKind::Add, trace("add-1", &calls));
    set.on(EventKind::Add, trace("add-2", &calls));
    set.on(EventKind::Remove, trace("remove-1", &calls));
    set.on(EventKind::Any, trace("wildcard-2", &calls));

    set.add(recs(serde_json::json!([{"id": 1}]))).expect("add");
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["add-1", "add-2", "wildcard-1", "wildcard-2"]
    );
}

#[test]
fn off_detaches_a_subscriber() {
    let mut set = flat_store();
    let log = EventLog::new();
    let subscription = log.attach(&mut set);

    set.add(recs(serde_json::json!([{"id": 1}]))).expect("add");
    assert_eq!(log.len(), 1);

    assert!(set.off(subscription));
    assert!(!set.off(subscription), "second removal is a no-op");
    set.add(recs(serde_json::json!([{"id": 2}]))).expect("add");
    assert_eq!(log.len(), 1);
}

#[test]
fn muting_suppresses_delivery_until_unmuted() {
    let mut set = flat_store();
    let log = EventLog::new();
    log.attach(&mut set);

    set.mute(true);
    set.add(recs(serde_json::json!([{"id": 1}]))).expect("add");
    set.remove(&[id(1)]);
    assert_eq!(log.len(), 0);

    set.mute(false);
    set.add(recs(serde_json::json!([{"id": 2}]))).expect("add");
    assert_eq!(log.kinds(), vec![EventKind::Add]);
}

#[test]
fn a_move_surfaces_as_exactly_one_update() {
    let mut set = sample_tree();
    let log = EventLog::new();
    log.attach(&mut set);

    set.move_item(&id(3), &id(5), Position::Child).expect("move");

    let events = log.take();
    assert_eq!(events.len(), 1, "intermediate splices stay invisible");
    match &events[0].0 {
        Event::Update { items, data } => {
            assert_eq!(items, &vec![id(3), id(4)]);
            assert!(data.is_empty());
        }
        other => panic!("expected update, got {other:?}"),
    }
    assert!(!set.is_muted(), "mute flag restored");
}

#[test]
fn sender_tags_travel_with_update_events() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "a"}])))
        .expect("seed");
    let log = EventLog::new();
    log.attach(&mut set);

    set.update_from(
        recs(serde_json::json!([{"id": 1, "v": "b"}])),
        Some("grid-7"),
    )
    .expect("update");

    let events = log.take();
    assert_eq!(events[0].1.as_deref(), Some("grid-7"));
}
