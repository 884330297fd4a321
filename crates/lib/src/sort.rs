//! Stable multi-key ordering.
//!
//! Sorting is a bottom-up stable merge sort rather than the standard
//! library's sort: rows with equal keys must keep their relative insertion
//! order, and that property is part of the store's contract, not an
//! implementation accident.

use std::cmp::Ordering;
use std::fmt;

use crate::record::Record;

/// How a query orders its results.
///
/// Key names may carry a leading `-` to request descending order on that
/// key. Multi-key comparison falls through to the next key on ties. Fields
/// missing from a record, or holding values of different types, compare as
/// equal rather than failing.
pub enum Order {
    /// Order by one field.
    Key(String),
    /// Order by several fields, highest priority first.
    Keys(Vec<String>),
    /// Order by a caller-supplied comparator.
    By(Box<dyn Fn(&Record, &Record) -> Ordering + Send + Sync>),
}

impl Order {
    pub fn key(name: impl Into<String>) -> Self {
        Order::Key(name.into())
    }

    pub fn keys<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Order::Keys(names.into_iter().map(Into::into).collect())
    }

    pub fn by(cmp: impl Fn(&Record, &Record) -> Ordering + Send + Sync + 'static) -> Self {
        Order::By(Box::new(cmp))
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Key(name) => f.debug_tuple("Key").field(name).finish(),
            Order::Keys(names) => f.debug_tuple("Keys").field(names).finish(),
            Order::By(_) => f.write_str("By(..)"),
        }
    }
}

/// Sorts records in place per the given order.
pub fn sort_records(items: &mut [Record], order: &Order) {
    match order {
        Order::By(cmp) => merge_sort(items, |a, b| cmp(a, b)),
        Order::Key(name) => {
            let keys = [name.as_str()];
            merge_sort(items, |a, b| compare_by_keys(a, b, &keys));
        }
        Order::Keys(names) => {
            let keys: Vec<&str> = names.iter().map(String::as_str).collect();
            merge_sort(items, |a, b| compare_by_keys(a, b, &keys));
        }
    }
}

/// Multi-key record comparison. On a tie the next key decides; a missing
/// field or a cross-type pair stops the chain and reports equality.
pub(crate) fn compare_by_keys(a: &Record, b: &Record, keys: &[&str]) -> Ordering {
    for key in keys {
        let (key, descending) = match key.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (*key, false),
        };
        match (a.get(key), b.get(key)) {
            (None, None) => continue,
            (Some(x), Some(y)) => match x.compare(y) {
                Some(Ordering::Equal) => continue,
                Some(ordering) => {
                    return if descending { ordering.reverse() } else { ordering };
                }
                None => return Ordering::Equal,
            },
            _ => return Ordering::Equal,
        }
    }
    Ordering::Equal
}

// Below this length the recursion hands off to a stable insertion sort.
const INSERTION_CUTOFF: usize = 8;

/// Stable merge sort over any cloneable slice.
pub fn merge_sort<T, F>(items: &mut [T], mut cmp: F)
where
    T: Clone,
    F: FnMut(&T, &T) -> Ordering,
{
    msort(items, &mut cmp);
}

fn msort<T, F>(items: &mut [T], cmp: &mut F)
where
    T: Clone,
    F: FnMut(&T, &T) -> Ordering,
{
    let len = items.len();
    if len <= INSERTION_CUTOFF {
        insertion(items, cmp);
        return;
    }
    let mid = len / 2;
    msort(&mut items[..mid], cmp);
    msort(&mut items[mid..], cmp);

    let left: Vec<T> = items[..mid].to_vec();
    let right: Vec<T> = items[mid..].to_vec();
    let (mut i, mut j) = (0, 0);
    for slot in items.iter_mut() {
        let take_left = i < left.len()
            && (j >= right.len() || cmp(&left[i], &right[j]) != Ordering::Greater);
        if take_left {
            *slot = left[i].clone();
            i += 1;
        } else {
            *slot = right[j].clone();
            j += 1;
        }
    }
}

fn insertion<T, F>(items: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
