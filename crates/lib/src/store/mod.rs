//! The record store.
//!
//! A [`DataSet`] owns a flat, insertion-ordered array of records plus an
//! id -> index map. In tree mode the array additionally keeps every record's
//! subtree stored contiguously right after it (pre-order layout), which is
//! what makes subtree operations cheap index arithmetic instead of pointer
//! chasing.
//!
//! All access goes through the documented operations: the store is the
//! single owner of its array and index, and every mutation emits one event
//! on the store's bus before the mutating method returns.

mod errors;
mod tree;

pub use errors::StoreError;
pub use tree::Position;

use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::Result;
use crate::events::{Bus, Event, EventKind, Subscription};
use crate::options::Options;
use crate::record::{Projection, Record};
use crate::sort::{Order, sort_records};
use crate::types::Schema;
use crate::value::{Id, Value};

/// Where a new child lands among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildPos {
    First,
    Last,
}

/// Options for the query methods: an optional record predicate, an optional
/// ordering, and an optional field projection.
#[derive(Default)]
pub struct Query {
    pub(crate) filter: Option<Box<dyn Fn(&Record) -> bool + Send + Sync>>,
    pub(crate) order: Option<Order>,
    pub(crate) fields: Option<Projection>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn fields(mut self, projection: Projection) -> Self {
        self.fields = Some(projection);
        self
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter.as_ref().map(|_| ".."))
            .field("order", &self.order)
            .field("fields", &self.fields)
            .finish()
    }
}

/// An in-memory, insertion-ordered record store with an optional tree
/// overlay.
///
/// # Examples
///
/// ```
/// use rowset::{DataSet, Options, Record};
///
/// let mut set = DataSet::new(Options::new()).unwrap();
/// let ids = set
///     .add(vec![Record::from_json(serde_json::json!({"id": 1, "name": "a"})).unwrap()])
///     .unwrap();
/// assert_eq!(set.len(), 1);
/// assert!(set.get(&ids[0]).is_some());
/// ```
pub struct DataSet {
    pub(crate) options: Options,
    pub(crate) schema: Schema,
    pub(crate) data: Vec<Record>,
    pub(crate) ids: HashMap<Id, usize>,
    pub(crate) saved: Vec<Record>,
    pub(crate) bus: Bus,
}

impl fmt::Debug for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSet")
            .field("len", &self.data.len())
            .field("tree", &self.options.tree)
            .finish_non_exhaustive()
    }
}

impl DataSet {
    /// Creates an empty store. Fails if the configured type map names an
    /// unrecognized type.
    pub fn new(options: Options) -> Result<Self> {
        let schema = Schema::compile(&options.types)?;
        Ok(DataSet {
            options,
            schema,
            data: Vec::new(),
            ids: HashMap::new(),
            saved: Vec::new(),
            bus: Bus::new(),
        })
    }

    /// Creates a store populated with the given records.
    pub fn with_data(options: Options, records: Vec<Record>) -> Result<Self> {
        let mut set = Self::new(options)?;
        set.add(records)?;
        Ok(set)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_tree(&self) -> bool {
        self.options.tree
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All records in storage order.
    pub fn records(&self) -> &[Record] {
        &self.data
    }

    /// The identifier of a record, read through the configured id field.
    pub fn record_id(&self, record: &Record) -> Option<Id> {
        record.id(&self.options.id_field)
    }

    // ---- events ----------------------------------------------------------

    /// Subscribes to an event kind; [`EventKind::Any`] receives everything.
    pub fn on(
        &mut self,
        kind: EventKind,
        callback: impl FnMut(&Event, Option<&str>) + Send + 'static,
    ) -> Subscription {
        self.bus.subscribe(kind, Box::new(callback))
    }

    pub fn off(&mut self, subscription: Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }

    /// Suspends (or resumes) event delivery. Used to batch multi-step
    /// rewrites into a single externally visible event.
    pub fn mute(&mut self, flag: bool) {
        self.bus.mute(flag);
    }

    pub fn is_muted(&self) -> bool {
        self.bus.is_muted()
    }

    pub(crate) fn emit(&mut self, event: Event, sender: Option<&str>) {
        self.bus.emit(&event, sender);
    }

    // ---- queries ---------------------------------------------------------

    /// Current storage position of an id.
    pub fn index(&self, id: &Id) -> Option<usize> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, id: &Id) -> Option<&Record> {
        self.index(id).map(|index| &self.data[index])
    }

    /// The records matching the given ids, in the given order. Unknown ids
    /// are skipped.
    pub fn get_many(&self, ids: &[Id]) -> Vec<Record> {
        ids.iter().filter_map(|id| self.get(id).cloned()).collect()
    }

    /// Filters, orders and projects records per the query.
    pub fn select(&self, query: &Query) -> Vec<Record> {
        let mut items: Vec<Record> = match &query.filter {
            Some(filter) => self.data.iter().filter(|r| filter(r)).cloned().collect(),
            None => self.data.clone(),
        };
        if let Some(order) = &query.order {
            sort_records(&mut items, order);
        }
        if let Some(projection) = &query.fields {
            items = items.iter().map(|r| r.project(projection)).collect();
        }
        items
    }

    /// Like [`select`](DataSet::select), but keyed by id.
    pub fn select_map(&self, query: &Query) -> HashMap<Id, Record> {
        let id_field = self.options.id_field.clone();
        self.select(query)
            .into_iter()
            .filter_map(|record| record.id(&id_field).map(|id| (id, record)))
            .collect()
    }

    /// The ids of the records matching the query (filter and order only).
    pub fn ids(&self, query: &Query) -> Vec<Id> {
        let id_field = &self.options.id_field;
        match &query.order {
            Some(order) => {
                let mut items: Vec<Record> = match &query.filter {
                    Some(filter) => self.data.iter().filter(|r| filter(r)).cloned().collect(),
                    None => self.data.clone(),
                };
                sort_records(&mut items, order);
                items.iter().filter_map(|r| r.id(id_field)).collect()
            }
            None => self
                .data
                .iter()
                .filter(|r| query.filter.as_ref().is_none_or(|f| f(r)))
                .filter_map(|r| r.id(id_field))
                .collect(),
        }
    }

    /// Runs a callback for every matching record. Without an order the
    /// callback sees storage order and storage indices; with one it sees the
    /// query result and result positions.
    pub fn for_each(&self, query: &Query, mut callback: impl FnMut(&Record, usize)) {
        if query.order.is_some() {
            for (i, record) in self.select(query).iter().enumerate() {
                callback(record, i);
            }
        } else {
            for (i, record) in self.data.iter().enumerate() {
                if query.filter.as_ref().is_none_or(|f| f(record)) {
                    callback(record, i);
                }
            }
        }
    }

    /// Maps every matching record. Ordering is applied to the records before
    /// mapping.
    pub fn map<T>(&self, query: &Query, mut callback: impl FnMut(&Record, usize) -> T) -> Vec<T> {
        if query.order.is_some() {
            self.select(query)
                .iter()
                .enumerate()
                .map(|(i, record)| callback(record, i))
                .collect()
        } else {
            let mut mapped = Vec::new();
            for (i, record) in self.data.iter().enumerate() {
                if query.filter.as_ref().is_none_or(|f| f(record)) {
                    mapped.push(callback(record, i));
                }
            }
            mapped
        }
    }

    // ---- mutation --------------------------------------------------------

    /// Adds records, appending roots and placing children per the tree
    /// overlay. Payloads may nest children under the configured child field;
    /// they are flattened recursively. Returns every added id and emits one
    /// `add` event.
    ///
    /// # Errors
    /// [`StoreError::DuplicateId`] if any incoming id (nested ones included)
    /// is already present or repeated in the batch; the store is left
    /// unchanged.
    pub fn add(&mut self, records: Vec<Record>) -> Result<Vec<Id>> {
        self.add_records(records, None, ChildPos::Last)
    }

    /// Adds records as the last children of `parent`.
    pub fn add_child(&mut self, records: Vec<Record>, parent: &Id) -> Result<Vec<Id>> {
        self.add_records(records, Some(parent), ChildPos::Last)
    }

    /// Adds records as the first children of `parent`.
    pub fn add_first_child(&mut self, records: Vec<Record>, parent: &Id) -> Result<Vec<Id>> {
        self.add_records(records, Some(parent), ChildPos::First)
    }

    /// Merges records into the store by id: known ids are updated
    /// field-by-field, unknown ids are added. Returns the affected ids
    /// (added first) and emits `add` and/or `update` events.
    ///
    /// # Errors
    /// [`StoreError::MissingId`] if any record carries no id field; the
    /// store is left unchanged.
    pub fn update(&mut self, records: Vec<Record>) -> Result<Vec<Id>> {
        self.update_from(records, None)
    }

    /// [`update`](DataSet::update) with a sender tag passed through to the
    /// emitted events, so a subscriber can recognize its own writes.
    pub fn update_from(&mut self, records: Vec<Record>, sender: Option<&str>) -> Result<Vec<Id>> {
        let id_field = self.options.id_field.clone();
        // stage everything first so a bad payload cannot half-apply
        let mut staged: Vec<(Id, Record, bool)> = Vec::with_capacity(records.len());
        let mut batch_new: HashSet<Id> = HashSet::new();
        for mut record in records {
            let id = record.id(&id_field).ok_or(StoreError::MissingId)?;
            self.schema.coerce(&mut record)?;
            let exists = self.ids.contains_key(&id) || batch_new.contains(&id);
            if !exists {
                batch_new.insert(id.clone());
            }
            staged.push((id, record, exists));
        }

        let mut added = Vec::new();
        let mut updated = Vec::new();
        let mut payloads = Vec::new();
        for (id, record, exists) in staged {
            if exists {
                self.merge_item(&id, &record);
                updated.push(id);
                payloads.push(record);
            } else {
                let new_id = self.add_item(record, None, ChildPos::Last)?;
                added.push(new_id);
            }
        }

        if !added.is_empty() {
            self.emit(
                Event::Add {
                    items: added.clone(),
                },
                sender,
            );
        }
        if !updated.is_empty() {
            self.emit(
                Event::Update {
                    items: updated.clone(),
                    data: payloads,
                },
                sender,
            );
        }
        added.extend(updated);
        Ok(added)
    }

    /// Removes records by id, cascading to whole subtrees in tree mode.
    /// Unknown ids are skipped silently. Returns every removed id (cascaded
    /// ones included) and emits one `remove` event; nothing is emitted when
    /// nothing was removed.
    pub fn remove(&mut self, ids: &[Id]) -> Vec<Id> {
        let mut removed = Vec::new();
        for id in ids {
            self.remove_single(id, &mut removed);
        }
        self.rebuild_ids();
        if !removed.is_empty() {
            self.emit(
                Event::Remove {
                    items: removed.clone(),
                },
                None,
            );
        }
        removed
    }

    pub fn remove_one(&mut self, id: &Id) -> Vec<Id> {
        self.remove(std::slice::from_ref(id))
    }

    /// Empties the store, emitting one `remove` event listing every id the
    /// store held (none when it was already empty).
    pub fn clear(&mut self) -> Vec<Id> {
        let id_field = self.options.id_field.clone();
        let ids: Vec<Id> = self.data.iter().filter_map(|r| r.id(&id_field)).collect();
        self.data.clear();
        self.ids.clear();
        if !ids.is_empty() {
            self.emit(Event::Remove { items: ids.clone() }, None);
        }
        ids
    }

    // ---- internals -------------------------------------------------------

    pub(crate) fn add_records(
        &mut self,
        records: Vec<Record>,
        parent: Option<&Id>,
        pos: ChildPos,
    ) -> Result<Vec<Id>> {
        self.validate_new_ids(&records)?;
        if let Some(pid) = parent
            && self.options.tree
            && self.index(pid).is_none()
        {
            return Err(StoreError::TargetNotFound { id: pid.clone() }.into());
        }
        let mut added = Vec::new();
        self.add_batch(records, parent, pos, &mut added)?;
        if !added.is_empty() {
            self.emit(
                Event::Add {
                    items: added.clone(),
                },
                None,
            );
        }
        Ok(added)
    }

    fn add_batch(
        &mut self,
        records: Vec<Record>,
        parent: Option<&Id>,
        pos: ChildPos,
        added: &mut Vec<Id>,
    ) -> Result<()> {
        let parent_field = self.options.parent_field.clone();
        let child_field = self.options.child_field.clone();
        for (i, mut record) in records.into_iter().enumerate() {
            let children: Vec<Record> = match record.remove(&child_field) {
                Some(Value::List(items)) => {
                    items.iter().filter_map(|v| v.as_map().cloned()).collect()
                }
                Some(other) => {
                    // a non-list child payload is ordinary data
                    record.set(child_field.clone(), other);
                    Vec::new()
                }
                None => Vec::new(),
            };
            // a later record naming an already-present parent attaches there
            let own_parent = if self.options.tree && i > 0 {
                parent_of(&record, &parent_field).filter(|p| self.ids.contains_key(p))
            } else {
                None
            };
            let id = self.add_item(record, own_parent.as_ref().or(parent), pos)?;
            added.push(id.clone());
            if !children.is_empty() {
                self.add_batch(children, Some(&id), ChildPos::Last, added)?;
            }
        }
        Ok(())
    }

    fn add_item(&mut self, mut record: Record, parent: Option<&Id>, pos: ChildPos) -> Result<Id> {
        if !self.options.tree {
            // keep the hierarchy recoverable when a nested payload is
            // ingested flat
            if let Some(pid) = parent {
                let parent_field = self.options.parent_field.clone();
                let missing = matches!(record.get(&parent_field), None | Some(Value::Null));
                if missing {
                    record.set(parent_field, pid.to_value());
                }
            }
            let id = self.prepare(&mut record)?;
            self.data.push(record);
            self.ids.insert(id.clone(), self.data.len() - 1);
            return Ok(id);
        }
        match parent {
            None => {
                let id = self.prepare(&mut record)?;
                self.data.push(record);
                self.ids.insert(id.clone(), self.data.len() - 1);
                self.finish_root_append();
                Ok(id)
            }
            Some(pid) => {
                let id = self.prepare(&mut record)?;
                self.place_under_parent(record, pid, pos)?;
                Ok(id)
            }
        }
    }

    /// Assigns an id if the record has none, rejects ids already present,
    /// and coerces typed fields.
    pub(crate) fn prepare(&mut self, record: &mut Record) -> Result<Id> {
        let id_field = self.options.id_field.clone();
        let id = match record.id(&id_field) {
            Some(id) => {
                if self.ids.contains_key(&id) {
                    return Err(StoreError::DuplicateId { id }.into());
                }
                id
            }
            None => {
                let id = Id::Str(Uuid::new_v4().to_string());
                record.set(id_field, id.to_value());
                id
            }
        };
        self.schema.coerce(record)?;
        Ok(id)
    }

    fn merge_item(&mut self, id: &Id, patch: &Record) {
        if let Some(index) = self.index(id) {
            let target = &mut self.data[index];
            for (field, value) in patch.iter() {
                target.set(field.clone(), value.clone());
            }
        }
    }

    fn remove_single(&mut self, id: &Id, removed: &mut Vec<Id>) {
        if removed.contains(id) {
            return;
        }
        let Some(index) = self.index(id) else {
            return;
        };
        let level_field = self.options.level_field.clone();
        let id_field = self.options.id_field.clone();
        let level = level_of(&self.data[index], &level_field);
        removed.push(id.clone());
        self.data.remove(index);
        self.rebuild_ids();
        if self.options.tree {
            while index < self.data.len() && level_of(&self.data[index], &level_field) > level {
                if let Some(child_id) = self.data[index].id(&id_field) {
                    removed.push(child_id);
                }
                self.data.remove(index);
            }
            self.fix_parent_flag(index);
            self.rebuild_ids();
        }
    }

    /// Rejects batches whose explicit ids (nested children included)
    /// collide with the store or with each other, before any mutation.
    fn validate_new_ids(&self, records: &[Record]) -> Result<()> {
        fn walk(set: &DataSet, records: &[Record], seen: &mut HashSet<Id>) -> Result<()> {
            for record in records {
                if let Some(id) = record.id(&set.options.id_field) {
                    if set.ids.contains_key(&id) || !seen.insert(id.clone()) {
                        return Err(StoreError::DuplicateId { id }.into());
                    }
                }
                if let Some(children) = record.get(&set.options.child_field).and_then(Value::as_list)
                {
                    let nested: Vec<Record> =
                        children.iter().filter_map(|v| v.as_map().cloned()).collect();
                    walk(set, &nested, seen)?;
                }
            }
            Ok(())
        }
        walk(self, records, &mut HashSet::new())
    }

    pub(crate) fn rebuild_ids(&mut self) {
        let id_field = self.options.id_field.clone();
        self.ids.clear();
        for (i, record) in self.data.iter().enumerate() {
            if let Some(id) = record.id(&id_field) {
                self.ids.insert(id, i);
            }
        }
    }

    /// Drops all records without emitting anything. Bulk loads use this
    /// between the `loading` and `load` events.
    pub(crate) fn wipe(&mut self) {
        self.data.clear();
        self.ids.clear();
    }
}

// Field readers shared by the tree overlay and the load paths. Levels and
// orders read as 0 when absent or non-numeric, and 0 doubles as "unset":
// levels start at 0 only for roots (which never ask) and orders start at 1.

pub(crate) fn level_of(record: &Record, field: &str) -> i64 {
    record.get(field).and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn order_of(record: &Record, field: &str) -> i64 {
    record.get(field).and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn num_unset(record: &Record, field: &str) -> bool {
    record.get(field).and_then(Value::as_i64).is_none_or(|n| n == 0)
}

/// Reads the parent id; `0`, null, the empty string and absence all mean
/// "root".
pub(crate) fn parent_of(record: &Record, field: &str) -> Option<Id> {
    let value = record.get(field)?;
    if !value.truthy() {
        return None;
    }
    Id::from_value(value)
}
