//! Flat record store operations and queries.

use chrono::{TimeZone, Utc};
use rowset::{DataSet, Options, Order, Projection, Query, Value};

use crate::helpers::*;

#[test]
fn add_assigns_generated_uuid_ids() {
    let mut set = flat_store();
    let ids = set
        .add(recs(serde_json::json!([{"name": "anonymous"}])))
        .expect("add");
    assert_eq!(ids.len(), 1);
    let rowset::Id::Str(generated) = &ids[0] else {
        panic!("generated ids are strings");
    };
    assert_eq!(generated.len(), 36);
    let record = set.get(&ids[0]).expect("record present");
    assert_eq!(record.get("name"), Some(&Value::Str("anonymous".into())));
}

#[test]
fn duplicate_id_is_rejected_and_store_unchanged() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "original"}])))
        .expect("seed");

    let err = set
        .add(recs(serde_json::json!([{"id": 1, "v": "usurper"}])))
        .unwrap_err();
    assert!(err.is_duplicate_id());
    assert_eq!(set.len(), 1);
    assert_eq!(
        set.get(&id(1)).and_then(|r| r.get("v").cloned()),
        Some(Value::Str("original".into()))
    );

    // a collision anywhere in a batch rejects the whole batch
    let err = set
        .add(recs(serde_json::json!([{"id": 7, "v": "a"}, {"id": 7, "v": "b"}])))
        .unwrap_err();
    assert!(err.is_duplicate_id());
    assert_eq!(set.len(), 1);
    assert!(set.get(&id(7)).is_none());
}

#[test]
fn add_then_remove_round_trips() {
    let mut set = flat_store();
    let before = set.len();
    let ids = set
        .add(recs(serde_json::json!([{"id": 1, "v": "x"}])))
        .expect("add");
    assert_eq!(set.len(), before + 1);

    let removed = set.remove(&ids);
    assert_eq!(removed, ids);
    assert!(set.get(&id(1)).is_none());
    assert_eq!(set.len(), before);
}

#[test]
fn update_merges_known_ids_and_adds_unknown() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "x", "keep": true}])))
        .expect("seed");

    let affected = set
        .update(recs(serde_json::json!([
            {"id": 1, "v": "y", "extra": 7},
            {"id": 9, "v": "new"}
        ])))
        .expect("update");
    // added ids come first, then updated
    assert_eq!(affected, vec![id(9), id(1)]);

    let merged = set.get(&id(1)).expect("still there");
    assert_eq!(merged.get("v"), Some(&Value::Str("y".into())));
    assert_eq!(merged.get("extra"), Some(&Value::Int(7)));
    assert_eq!(merged.get("keep"), Some(&Value::Bool(true)));
    assert!(set.get(&id(9)).is_some());
}

#[test]
fn update_without_id_field_fails_before_touching_anything() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "x"}])))
        .expect("seed");

    let err = set
        .update(recs(serde_json::json!([
            {"id": 1, "v": "changed"},
            {"v": "no id here"}
        ])))
        .unwrap_err();
    assert_eq!(err.module(), "store");
    assert_eq!(
        set.get(&id(1)).and_then(|r| r.get("v").cloned()),
        Some(Value::Str("x".into()))
    );
    assert_eq!(set.len(), 1);
}

#[test]
fn removing_unknown_ids_is_silent() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1}]))).expect("seed");
    let log = EventLog::new();
    log.attach(&mut set);

    let removed = set.remove(&[id(999)]);
    assert!(removed.is_empty());
    assert_eq!(log.len(), 0, "no remove event for a no-op removal");

    // mixing known and unknown ids removes the known ones only
    let removed = set.remove(&[id(999), id(1)]);
    assert_eq!(removed, vec![id(1)]);
    assert_eq!(log.len(), 1);
}

#[test]
fn clear_reports_all_ids_once() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1}, {"id": 2}, {"id": 3}])))
        .expect("seed");
    let log = EventLog::new();
    log.attach(&mut set);

    let ids = set.clear();
    assert_eq!(ids, vec![id(1), id(2), id(3)]);
    assert!(set.is_empty());
    assert_eq!(log.len(), 1);

    // clearing an empty store stays silent
    assert!(set.clear().is_empty());
    assert_eq!(log.len(), 1);
}

#[test]
fn get_many_skips_unknown_ids() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1}, {"id": 2}])))
        .expect("seed");
    let found = set.get_many(&[id(2), id(42), id(1)]);
    assert_eq!(found.len(), 2);
    assert_eq!(set.record_id(&found[0]), Some(id(2)));
    assert_eq!(set.record_id(&found[1]), Some(id(1)));
}

#[test]
fn select_filters_orders_and_projects() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "name": "carol", "age": 41},
        {"id": 2, "name": "alice", "age": 29},
        {"id": 3, "name": "bob", "age": 35},
        {"id": 4, "name": "dave", "age": 17}
    ])))
    .expect("seed");

    let adults = set.select(
        &Query::new()
            .filter(|r| r.get("age").and_then(Value::as_i64).unwrap_or(0) >= 18)
            .order(Order::key("name"))
            .fields(Projection::keep(["id", "name"])),
    );
    assert_eq!(adults.len(), 3);
    assert_eq!(adults[0].get("name"), Some(&Value::Str("alice".into())));
    assert_eq!(adults[2].get("name"), Some(&Value::Str("carol".into())));
    assert!(adults[0].get("age").is_none(), "age projected away");

    let renamed = set.select(
        &Query::new()
            .filter(|r| r.id("id") == Some(rowset::Id::Int(1)))
            .fields(Projection::rename([("name", "label")])),
    );
    assert_eq!(renamed[0].get("label"), Some(&Value::Str("carol".into())));
    assert!(renamed[0].get("name").is_none());
}

#[test]
fn select_map_keys_records_by_id() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "a"}, {"id": 2, "v": "b"}])))
        .expect("seed");
    let by_id = set.select_map(&Query::new());
    assert_eq!(by_id.len(), 2);
    assert_eq!(
        by_id.get(&id(2)).and_then(|r| r.get("v").cloned()),
        Some(Value::Str("b".into()))
    );
}

#[test]
fn ids_supports_filter_and_order() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "rank": 3},
        {"id": 2, "rank": 1},
        {"id": 3, "rank": 2}
    ])))
    .expect("seed");

    assert_eq!(set.ids(&Query::new()), vec![id(1), id(2), id(3)]);
    assert_eq!(
        set.ids(&Query::new().order(Order::key("rank"))),
        vec![id(2), id(3), id(1)]
    );
    assert_eq!(
        set.ids(&Query::new().filter(|r| r.get("rank").and_then(Value::as_i64) != Some(1))),
        vec![id(1), id(3)]
    );
}

#[test]
fn for_each_sees_storage_indices_without_an_order() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 10}, {"id": 20}, {"id": 30}])))
        .expect("seed");

    let mut seen = Vec::new();
    set.for_each(&Query::new(), |record, index| {
        seen.push((set.record_id(record).unwrap(), index));
    });
    assert_eq!(seen, vec![(id(10), 0), (id(20), 1), (id(30), 2)]);

    let doubled = set.map(&Query::new().order(Order::key("-id")), |record, _| {
        record.get("id").and_then(Value::as_i64).unwrap() * 2
    });
    assert_eq!(doubled, vec![60, 40, 20]);
}

#[test]
fn index_tracks_positions_through_removal() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1}, {"id": 2}, {"id": 3}])))
        .expect("seed");
    assert_eq!(set.index(&id(3)), Some(2));
    set.remove(&[id(2)]);
    assert_eq!(set.index(&id(3)), Some(1));
    assert_eq!(set.index(&id(2)), None);
}

#[test]
fn typed_date_fields_coerce_on_ingestion() {
    let mut set = DataSet::new(Options::new().field_type("created", "Date")).expect("store");
    set.add(recs(serde_json::json!([{"id": 1, "created": "2020-01-01"}])))
        .expect("add");

    let created = set
        .get(&id(1))
        .and_then(|r| r.get("created").cloned())
        .expect("created present");
    let midnight = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(created, Value::Date(midnight));

    // updates coerce through the same schema
    set.update(recs(serde_json::json!([{"id": 1, "created": 0}])))
        .expect("update");
    let epoch = set
        .get(&id(1))
        .and_then(|r| r.get("created").cloned())
        .and_then(|v| v.as_date())
        .expect("date");
    assert_eq!(epoch.timestamp_millis(), 0);
}

#[test]
fn unknown_type_names_fail_construction() {
    let err = DataSet::new(Options::new().field_type("x", "Decimal")).unwrap_err();
    assert!(err.is_type_error());
}

#[test]
fn with_data_seeds_the_store() {
    let set = DataSet::with_data(
        Options::new(),
        recs(serde_json::json!([{"id": 1}, {"id": 2}])),
    )
    .expect("seeded");
    assert_eq!(set.len(), 2);
}

#[test]
fn custom_id_field_is_respected() {
    let mut set = DataSet::new(Options::new().id_field("_key")).expect("store");
    set.add(recs(serde_json::json!([{"_key": "alpha", "v": 1}])))
        .expect("add");
    let key = rowset::Id::Str("alpha".into());
    assert!(set.get(&key).is_some());
    let err = set
        .add(recs(serde_json::json!([{"_key": "alpha"}])))
        .unwrap_err();
    assert!(err.is_duplicate_id());
}
