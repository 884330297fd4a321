//! Stable multi-key ordering.

use rowset::{Order, Query, Value};

use crate::helpers::*;

#[test]
fn equal_keys_preserve_insertion_order() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "k": 1, "n": "a"},
        {"id": 2, "k": 1, "n": "b"},
        {"id": 3, "k": 1, "n": "c"}
    ])))
    .expect("seed");

    let sorted = set.select(&Query::new().order(Order::key("k")));
    let names: Vec<_> = sorted
        .iter()
        .map(|r| r.get("n").and_then(Value::as_str).unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn multi_key_orders_with_descending_minor_key() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "a": 1, "b": 2},
        {"id": 2, "a": 1, "b": 1},
        {"id": 3, "a": 0, "b": 5}
    ])))
    .expect("seed");

    let sorted = set.select(&Query::new().order(Order::keys(["a", "-b"])));
    let pairs: Vec<_> = sorted
        .iter()
        .map(|r| {
            (
                r.get("a").and_then(Value::as_i64).unwrap(),
                r.get("b").and_then(Value::as_i64).unwrap(),
            )
        })
        .collect();
    assert_eq!(pairs, vec![(0, 5), (1, 2), (1, 1)]);
}

#[test]
fn descending_single_key() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "rank": 2},
        {"id": 2, "rank": 3},
        {"id": 3, "rank": 1}
    ])))
    .expect("seed");
    assert_eq!(
        set.ids(&Query::new().order(Order::key("-rank"))),
        vec![id(2), id(1), id(3)]
    );
}

#[test]
fn custom_comparators_drive_the_sort() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "n": "bb"},
        {"id": 2, "n": "a"},
        {"id": 3, "n": "cccc"}
    ])))
    .expect("seed");

    let by_name_len = Order::by(|a, b| {
        let len = |r: &rowset::Record| r.get("n").and_then(Value::as_str).map_or(0, str::len);
        len(a).cmp(&len(b))
    });
    assert_eq!(
        set.ids(&Query::new().order(by_name_len)),
        vec![id(2), id(1), id(3)]
    );
}

#[test]
fn missing_and_mismatched_fields_compare_as_equal() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "k": "text"},
        {"id": 2, "k": 3},
        {"id": 3}
    ])))
    .expect("seed");
    // nothing is comparable, so insertion order survives
    assert_eq!(
        set.ids(&Query::new().order(Order::key("k"))),
        vec![id(1), id(2), id(3)]
    );
}

#[test]
fn stability_survives_the_merge_path_on_larger_inputs() {
    let mut set = flat_store();
    let rows: Vec<serde_json::Value> = (0..30)
        .map(|i| serde_json::json!({"id": i, "bucket": i % 3, "seq": i}))
        .collect();
    set.add(recs(serde_json::Value::Array(rows))).expect("seed");

    let sorted = set.select(&Query::new().order(Order::key("bucket")));
    assert_eq!(sorted.len(), 30);
    let mut last_bucket = -1;
    let mut last_seq = -1;
    for record in &sorted {
        let bucket = record.get("bucket").and_then(Value::as_i64).unwrap();
        let seq = record.get("seq").and_then(Value::as_i64).unwrap();
        if bucket == last_bucket {
            assert!(seq > last_seq, "equal keys out of insertion order");
        } else {
            assert!(bucket > last_bucket);
            last_bucket = bucket;
        }
        last_seq = seq;
    }
}

#[test]
fn merge_sort_orders_plain_slices() {
    let mut values = vec![9, 3, 7, 1, 8, 2, 6, 0, 5, 4, 11, 10];
    rowset::sort::merge_sort(&mut values, |a, b| a.cmp(b));
    assert_eq!(values, (0..12).collect::<Vec<_>>());
}
