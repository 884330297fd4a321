//! Snapshot diffing.
//!
//! [`DataSet::save`] captures a deep copy of the store sorted ascending by
//! id; [`DataSet::diff`] walks the live store and the snapshot with a
//! two-pointer merge scan, so classifying every record as added, updated or
//! deleted costs O(n) for stores with homogeneous id types. Stores mixing
//! integer and string ids are out of contract here.

use std::cmp::Ordering;

use crate::record::Record;
use crate::sort::Order;
use crate::store::{DataSet, Query};

/// The classified difference between the live store and a baseline.
///
/// Buckets hold full records: the current version for `added` and
/// `updated`, the baseline version for `deleted`. Records identical
/// field-for-field in both appear nowhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    pub added: Vec<Record>,
    pub updated: Vec<Record>,
    pub deleted: Vec<Record>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of classified records.
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }
}

impl DataSet {
    /// Captures the current store, sorted ascending by id, as the baseline
    /// for [`diff`](DataSet::diff). The copy is independent: later store
    /// mutation does not touch it. Kept until the next `save`.
    pub fn save(&mut self) -> &[Record] {
        self.saved = self.by_id_snapshot();
        &self.saved
    }

    /// The snapshot captured by the last [`save`](DataSet::save), empty if
    /// none was taken.
    pub fn saved(&self) -> &[Record] {
        &self.saved
    }

    /// Diffs the live store against the last saved snapshot.
    pub fn diff(&self) -> Diff {
        self.diff_against(&self.saved)
    }

    /// Diffs the live store against an arbitrary baseline, which must be
    /// sorted ascending by id.
    pub fn diff_against(&self, baseline: &[Record]) -> Diff {
        let id_field = &self.options.id_field;
        let current = self.by_id_snapshot();
        let mut diff = Diff::default();
        let (mut i, mut j) = (0, 0);
        while i < current.len() && j < baseline.len() {
            let x = &current[i];
            let y = &baseline[j];
            match x.id(id_field).cmp(&y.id(id_field)) {
                Ordering::Equal => {
                    if x != y {
                        diff.updated.push(x.clone());
                    }
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    diff.added.push(x.clone());
                    i += 1;
                }
                Ordering::Greater => {
                    diff.deleted.push(y.clone());
                    j += 1;
                }
            }
        }
        diff.added.extend(current[i..].iter().cloned());
        diff.deleted.extend(baseline[j..].iter().cloned());
        diff
    }

    fn by_id_snapshot(&self) -> Vec<Record> {
        self.select(&Query::new().order(Order::key(self.options.id_field.clone())))
    }
}
