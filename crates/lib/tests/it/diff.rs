//! Snapshot capture and change classification.

use rowset::Value;

use crate::helpers::*;

#[test]
fn classifies_added_updated_and_deleted() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([
        {"id": 1, "v": "x"},
        {"id": 2, "v": "y"},
        {"id": 3, "v": "z"}
    ])))
    .expect("seed");
    set.save();

    set.update(recs(serde_json::json!([{"id": 2, "v": "Y"}])))
        .expect("update");
    set.remove(&[id(3)]);
    set.add(recs(serde_json::json!([{"id": 4, "v": "w"}])))
        .expect("add");

    let diff = set.diff();
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.updated.len(), 1);
    assert_eq!(diff.deleted.len(), 1);

    assert_eq!(diff.added[0].id("id"), Some(id(4)));
    assert_eq!(diff.added[0].get("v"), Some(&Value::Str("w".into())));
    assert_eq!(diff.updated[0].id("id"), Some(id(2)));
    assert_eq!(diff.updated[0].get("v"), Some(&Value::Str("Y".into())));
    assert_eq!(diff.deleted[0].id("id"), Some(id(3)));
    assert_eq!(diff.deleted[0].get("v"), Some(&Value::Str("z".into())));

    // the untouched record appears in no bucket
    assert!(
        diff.added
            .iter()
            .chain(&diff.updated)
            .chain(&diff.deleted)
            .all(|r| r.id("id") != Some(id(1)))
    );
}

#[test]
fn unchanged_stores_diff_empty() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1}, {"id": 2}])))
        .expect("seed");
    set.save();
    let diff = set.diff();
    assert!(diff.is_empty());
    assert_eq!(diff.len(), 0);
}

#[test]
fn snapshot_is_an_independent_copy() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "before"}])))
        .expect("seed");
    set.save();

    set.update(recs(serde_json::json!([{"id": 1, "v": "after"}])))
        .expect("update");
    assert_eq!(
        set.saved()[0].get("v"),
        Some(&Value::Str("before".into())),
        "snapshot unaffected by later mutation"
    );

    let diff = set.diff();
    assert_eq!(diff.updated.len(), 1);
}

#[test]
fn diff_against_arbitrary_baselines() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "a"}, {"id": 3, "v": "c"}])))
        .expect("seed");

    let baseline = recs(serde_json::json!([
        {"id": 1, "v": "a"},
        {"id": 2, "v": "b"}
    ]));
    let diff = set.diff_against(&baseline);
    assert_eq!(diff.added.len(), 1);
    assert_eq!(diff.added[0].id("id"), Some(id(3)));
    assert_eq!(diff.deleted.len(), 1);
    assert_eq!(diff.deleted[0].id("id"), Some(id(2)));
    assert!(diff.updated.is_empty());
}

#[test]
fn save_returns_the_id_sorted_snapshot() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 3}, {"id": 1}, {"id": 2}])))
        .expect("seed");
    let snapshot: Vec<_> = set.save().to_vec();
    let ids: Vec<_> = snapshot.iter().filter_map(|r| r.id("id")).collect();
    assert_eq!(ids, vec![id(1), id(2), id(3)]);
}

#[test]
fn field_level_changes_are_what_counts_as_updated() {
    let mut set = flat_store();
    set.add(recs(serde_json::json!([{"id": 1, "v": "same", "n": 5}])))
        .expect("seed");
    set.save();

    // rewriting a field with the same value is not a difference
    set.update(recs(serde_json::json!([{"id": 1, "v": "same"}])))
        .expect("update");
    assert!(set.diff().is_empty());

    // adding a new field is
    set.update(recs(serde_json::json!([{"id": 1, "extra": true}])))
        .expect("update");
    assert_eq!(set.diff().updated.len(), 1);
}
