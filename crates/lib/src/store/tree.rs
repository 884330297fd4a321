//! Tree overlay: maintenance of the pre-order contiguous-subtree layout.
//!
//! There is no separate tree structure. A record's subtree is the run of
//! records stored immediately after it with a greater level, so subtree
//! boundaries, cascades and moves are all plain index arithmetic over the
//! storage array. Every operation here leaves three invariants intact:
//!
//! - a record sits strictly between its parent and the parent's next
//!   same-or-shallower-level successor;
//! - a record's level is its parent's level plus one (roots are 0);
//! - sibling orders are bumped upward on collision instead of erroring.

use std::collections::HashMap;

use tracing::trace;

use crate::Result;
use crate::events::Event;
use crate::record::Record;
use crate::sort::Order;
use crate::value::{Id, Value};

use super::{ChildPos, DataSet, Query, StoreError, level_of, num_unset, order_of, parent_of};

/// Where a moved subtree lands relative to the target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
    Child,
}

/// Side of the target for positional inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertSide {
    Before,
    After,
}

/// Snapshot of the reference node taken before any splice shifts indices.
struct NodeInfo {
    parent: Option<Value>,
    level: i64,
    order: i64,
}

impl DataSet {
    /// The index of the first record after `index` whose level is not
    /// deeper, i.e. the end of the subtree rooted at `index`. `None` when
    /// the subtree extends to the end of storage.
    pub(crate) fn find_next(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        if next >= self.data.len() {
            return None;
        }
        if !self.options.tree {
            return Some(next);
        }
        let level_field = &self.options.level_field;
        let level = level_of(&self.data[index], level_field);
        let mut i = next;
        while i < self.data.len() && level_of(&self.data[i], level_field) > level {
            i += 1;
        }
        (i < self.data.len()).then_some(i)
    }

    /// The storage range covered by a record and its whole subtree.
    pub fn subtree_range(&self, id: &Id) -> Option<std::ops::Range<usize>> {
        let index = self.index(id)?;
        let end = self.find_next(index).unwrap_or(self.data.len());
        Some(index..end)
    }

    /// True when the record's first successor is its own child.
    pub fn has_child(&self, id: &Id) -> bool {
        if !self.options.tree {
            return false;
        }
        let Some(index) = self.index(id) else {
            return false;
        };
        match self.data.get(index + 1) {
            Some(next) => parent_of(next, &self.options.parent_field).as_ref() == Some(id),
            None => false,
        }
    }

    pub fn first_child(&self, id: &Id) -> Option<&Record> {
        let index = self.index(id)?;
        let level_field = &self.options.level_field;
        let next = self.data.get(index + 1)?;
        (level_of(next, level_field) > level_of(&self.data[index], level_field)).then_some(next)
    }

    /// Walks the parent chain of `id` and reports whether it passes through
    /// `ancestor`.
    pub fn is_descendant(&self, id: &Id, ancestor: &Id) -> bool {
        if !self.options.tree {
            return false;
        }
        let parent_field = &self.options.parent_field;
        let mut current = id.clone();
        // hop bound guards against corrupted parent cycles
        for _ in 0..=self.data.len() {
            let Some(record) = self.get(&current) else {
                return false;
            };
            match parent_of(record, parent_field) {
                None => return false,
                Some(parent) => {
                    if &parent == ancestor {
                        return true;
                    }
                    current = parent;
                }
            }
        }
        false
    }

    /// Inserts records immediately before the target record. In tree mode a
    /// batch is shifted so its first record lands at the target's level,
    /// keeping relative level offsets; colliding sibling orders are
    /// renumbered upward.
    pub fn insert_before(&mut self, records: Vec<Record>, target: &Id) -> Result<Vec<Id>> {
        self.insert_records(records, target, InsertSide::Before)
    }

    /// Inserts records after the target record's subtree.
    pub fn insert_after(&mut self, records: Vec<Record>, target: &Id) -> Result<Vec<Id>> {
        self.insert_records(records, target, InsertSide::After)
    }

    pub(crate) fn insert_records(
        &mut self,
        mut records: Vec<Record>,
        target: &Id,
        side: InsertSide,
    ) -> Result<Vec<Id>> {
        self.validate_new_ids(&records)?;
        let mut at = self
            .index(target)
            .ok_or_else(|| StoreError::TargetNotFound { id: target.clone() })?;
        let parent_field = self.options.parent_field.clone();
        let level_field = self.options.level_field.clone();

        if self.options.tree
            && let Some(first_level) = records
                .first()
                .and_then(|r| r.get(&level_field))
                .and_then(Value::as_i64)
        {
            let delta = level_of(&self.data[at], &level_field) - first_level;
            if delta != 0 {
                for record in &mut records {
                    if let Some(level) = record.get(&level_field).and_then(Value::as_i64) {
                        record.set(level_field.clone(), level + delta);
                    }
                }
            }
        }

        let mut added: Vec<Id> = Vec::new();
        for (i, record) in records.into_iter().enumerate() {
            // records following their own (just inserted) parent keep it
            let own_parent = if i > 0 {
                parent_of(&record, &parent_field).filter(|p| added.contains(p))
            } else {
                None
            };
            match side {
                InsertSide::Before => {
                    let (id, _) = self.insert_item(record, at + i, side, own_parent.as_ref())?;
                    added.push(id);
                }
                InsertSide::After => {
                    let (id, index) = self.insert_item(record, at, side, own_parent.as_ref())?;
                    at = index;
                    added.push(id);
                }
            }
        }
        self.rebuild_ids();
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

    fn insert_item(
        &mut self,
        mut record: Record,
        at: usize,
        side: InsertSide,
        parent: Option<&Id>,
    ) -> Result<(Id, usize)> {
        let parent_field = self.options.parent_field.clone();
        let level_field = self.options.level_field.clone();
        let order_field = self.options.order_field.clone();

        let node = self.data.get(at).map(|n| NodeInfo {
            parent: n.get(&parent_field).cloned(),
            level: level_of(n, &level_field),
            order: order_of(n, &order_field),
        });
        let id = self.prepare(&mut record)?;
        let order_missing = num_unset(&record, &order_field);

        let index = match (side, &node) {
            (InsertSide::Before, Some(_)) => {
                self.data.insert(at, record);
                at
            }
            (InsertSide::After, Some(_)) => match self.find_next(at) {
                None => {
                    self.data.push(record);
                    self.data.len() - 1
                }
                Some(next) => {
                    self.data.insert(next, record);
                    next
                }
            },
            (_, None) => {
                self.data.push(record);
                self.data.len() - 1
            }
        };

        if self.options.tree {
            match node {
                Some(node) => {
                    let parent_value = parent
                        .map(Id::to_value)
                        .or(node.parent)
                        .unwrap_or(Value::Int(0));
                    self.data[index].set(parent_field, parent_value);
                    if num_unset(&self.data[index], &level_field) {
                        self.data[index].set(level_field.clone(), node.level);
                    }
                    let appended_last = index + 1 == self.data.len();
                    if order_missing || appended_last {
                        let order = match side {
                            InsertSide::After => node.order + 1,
                            InsertSide::Before => node.order,
                        };
                        self.data[index].set(order_field.clone(), order);
                    }
                    let last_order = order_of(&self.data[index], &order_field);
                    self.re_order(index + 1, node.level, last_order);
                }
                None => {
                    self.data[index].set(parent_field, 0);
                    if num_unset(&self.data[index], &level_field) {
                        self.data[index].set(level_field.clone(), 0);
                    }
                    if num_unset(&self.data[index], &order_field) {
                        let order = match side {
                            InsertSide::After => self.last_root_order().unwrap_or(1),
                            InsertSide::Before => 1,
                        };
                        self.data[index].set(order_field, order);
                    }
                }
            }
        }
        Ok((id, index))
    }

    /// Detaches a record's whole subtree and reattaches it relative to the
    /// target. The intermediate splices run muted; one `update` event with
    /// every moved id fires at the end.
    ///
    /// # Errors
    /// [`StoreError::InvalidMove`] if the target sits inside the moved
    /// subtree; the store is left unchanged. Moving a record onto itself is
    /// a no-op.
    pub fn move_item(&mut self, id: &Id, target: &Id, position: Position) -> Result<Vec<Id>> {
        let index = self
            .index(id)
            .ok_or_else(|| StoreError::TargetNotFound { id: id.clone() })?;
        if self.index(target).is_none() {
            return Err(StoreError::TargetNotFound { id: target.clone() }.into());
        }
        if self.is_descendant(target, id) {
            return Err(StoreError::InvalidMove {
                id: id.clone(),
                target: target.clone(),
            }
            .into());
        }
        if id == target {
            return Ok(Vec::new());
        }
        trace!(%id, %target, ?position, "moving subtree");
        let was_muted = self.bus.is_muted();
        self.bus.mute(true);
        let result = self.relocate(index, target, position);
        self.bus.mute(was_muted);
        let moved = result?;
        if !moved.is_empty() {
            self.emit(
                Event::Update {
                    items: moved.clone(),
                    data: Vec::new(),
                },
                None,
            );
        }
        Ok(moved)
    }

    fn relocate(&mut self, index: usize, target: &Id, position: Position) -> Result<Vec<Id>> {
        let level_field = self.options.level_field.clone();
        let end = self.find_next(index).unwrap_or(self.data.len());
        let mut subtree: Vec<Record> = self.data.drain(index..end).collect();
        self.fix_parent_flag(index);
        self.rebuild_ids();

        let target_level = self
            .get(target)
            .map(|r| level_of(r, &level_field))
            .unwrap_or(0);
        let new_level = match position {
            Position::Before | Position::After => target_level,
            Position::Child => target_level + 1,
        };
        if let Some(first) = subtree.first() {
            let delta = level_of(first, &level_field) - new_level;
            if delta != 0 {
                for record in &mut subtree {
                    let level = level_of(record, &level_field);
                    record.set(level_field.clone(), level - delta);
                }
            }
        }
        match position {
            Position::Before => self.insert_records(subtree, target, InsertSide::Before),
            Position::After => self.insert_records(subtree, target, InsertSide::After),
            Position::Child => self.add_records(subtree, Some(target), ChildPos::Last),
        }
    }

    /// Places a prepared record under its parent: right after the parent
    /// for [`ChildPos::First`], after the parent's last descendant
    /// otherwise.
    pub(crate) fn place_under_parent(
        &mut self,
        mut record: Record,
        parent: &Id,
        pos: ChildPos,
    ) -> Result<()> {
        let parent_field = self.options.parent_field.clone();
        let level_field = self.options.level_field.clone();
        let order_field = self.options.order_field.clone();
        let has_children_field = self.options.has_children_field.clone();

        let pindex = self
            .index(parent)
            .ok_or_else(|| StoreError::TargetNotFound { id: parent.clone() })?;
        let plevel = level_of(&self.data[pindex], &level_field);
        record.set(parent_field, parent.to_value());
        if num_unset(&record, &level_field) {
            record.set(level_field.clone(), plevel + 1);
        }
        self.data[pindex].set(has_children_field, true);

        let has_child =
            pindex + 1 < self.data.len() && level_of(&self.data[pindex + 1], &level_field) > plevel;
        if !has_child {
            record.set(order_field, 1);
            self.data.insert(pindex + 1, record);
        } else {
            match pos {
                ChildPos::First => {
                    let sibling_order = order_of(&self.data[pindex + 1], &order_field);
                    let level = level_of(&record, &level_field);
                    let order_missing = num_unset(&record, &order_field);
                    self.data.insert(pindex + 1, record);
                    if order_missing {
                        self.data[pindex + 1].set(order_field.clone(), sibling_order);
                        self.re_order(pindex + 2, level, sibling_order);
                    }
                }
                ChildPos::Last => {
                    let order_missing = num_unset(&record, &order_field);
                    match self.find_next(pindex) {
                        None => {
                            let prev_order = self
                                .data
                                .last()
                                .map(|r| order_of(r, &order_field))
                                .unwrap_or(0);
                            self.data.push(record);
                            if order_missing {
                                let last = self.data.len() - 1;
                                self.data[last].set(order_field, prev_order + 1);
                            }
                        }
                        Some(next) => {
                            let prev_order = order_of(&self.data[next - 1], &order_field);
                            self.data.insert(next, record);
                            if order_missing {
                                self.data[next].set(order_field, prev_order + 1);
                            }
                        }
                    }
                }
            }
        }
        self.rebuild_ids();
        Ok(())
    }

    /// Level and order defaults for a root record just appended at the end
    /// of storage.
    pub(crate) fn finish_root_append(&mut self) {
        let level_field = self.options.level_field.clone();
        let order_field = self.options.order_field.clone();
        let last = self.data.len() - 1;
        if num_unset(&self.data[last], &level_field) {
            self.data[last].set(level_field.clone(), 0);
        }
        if num_unset(&self.data[last], &order_field) {
            let mut order = 1;
            for i in (0..last).rev() {
                if level_of(&self.data[i], &level_field) == 0 {
                    order = order_of(&self.data[i], &order_field) + 1;
                    break;
                }
            }
            self.data[last].set(order_field, order);
        }
    }

    /// Bumps colliding sibling orders upward, starting at `start` and
    /// stopping at the first shallower record. Descendants are skipped.
    pub(crate) fn re_order(&mut self, start: usize, level: i64, mut last_order: i64) {
        let level_field = self.options.level_field.clone();
        let order_field = self.options.order_field.clone();
        for i in start..self.data.len() {
            let l = level_of(&self.data[i], &level_field);
            if l > level {
                continue;
            }
            if l < level {
                break;
            }
            if order_of(&self.data[i], &order_field) <= last_order {
                last_order += 1;
                self.data[i].set(order_field.clone(), last_order);
            }
        }
    }

    /// After a removal or detach at `index`, recomputes the preceding
    /// record's has-children flag if it was set.
    pub(crate) fn fix_parent_flag(&mut self, index: usize) {
        if index == 0 {
            return;
        }
        let level_field = self.options.level_field.clone();
        let has_children_field = self.options.has_children_field.clone();
        let prev = index - 1;
        let was_set = self
            .data
            .get(prev)
            .and_then(|r| r.get(&has_children_field))
            .map(Value::truthy)
            == Some(true);
        if was_set {
            let still = index < self.data.len()
                && level_of(&self.data[index], &level_field)
                    > level_of(&self.data[prev], &level_field);
            self.data[prev].set(has_children_field, still);
        }
    }

    fn last_root_order(&self) -> Option<i64> {
        let parent_field = &self.options.parent_field;
        let order_field = &self.options.order_field;
        self.data
            .iter()
            .rev()
            .find(|r| parent_of(r, parent_field).is_none())
            .map(|r| order_of(r, order_field))
    }

    // ---- hierarchical import/export --------------------------------------

    /// Exports the store as a nested structure with children embedded under
    /// the configured child field, siblings ordered by level then order.
    ///
    /// # Errors
    /// [`StoreError::OrphanRecord`] if a record points at a parent the
    /// store does not hold.
    pub fn to_tree(&self) -> Result<Vec<Record>> {
        let (items, roots, children) = self.hierarchy()?;
        let child_field = &self.options.child_field;
        Ok(roots
            .iter()
            .map(|&i| build_nested(&items, &children, i, child_field))
            .collect())
    }

    /// Flattens the store into pre-order, deriving levels from the parent
    /// relation where they are missing and flagging parents. With `reorder`
    /// set, siblings are renumbered 1..n per group, removing gaps and
    /// collisions.
    pub fn to_preorder(&self, reorder: bool) -> Result<Vec<Record>> {
        let (items, roots, children) = self.hierarchy()?;
        let mut out = Vec::with_capacity(items.len());
        self.walk_preorder(&items, &children, &roots, 0, reorder, &mut out);
        Ok(out)
    }

    #[allow(clippy::type_complexity)]
    fn hierarchy(&self) -> Result<(Vec<Record>, Vec<usize>, HashMap<usize, Vec<usize>>)> {
        let id_field = &self.options.id_field;
        let parent_field = &self.options.parent_field;
        let items = self.select(&Query::new().order(Order::keys([
            self.options.level_field.clone(),
            self.options.order_field.clone(),
        ])));
        let mut index: HashMap<Id, usize> = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if let Some(id) = item.id(id_field) {
                index.insert(id, i);
            }
        }
        let mut roots = Vec::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            match parent_of(item, parent_field) {
                None => roots.push(i),
                Some(parent) => match index.get(&parent) {
                    Some(&pi) => children.entry(pi).or_default().push(i),
                    None => {
                        return Err(StoreError::OrphanRecord {
                            id: item.id(id_field).unwrap_or(Id::Int(0)),
                            parent,
                        }
                        .into());
                    }
                },
            }
        }
        Ok((items, roots, children))
    }

    fn walk_preorder(
        &self,
        items: &[Record],
        children: &HashMap<usize, Vec<usize>>,
        group: &[usize],
        depth: i64,
        reorder: bool,
        out: &mut Vec<Record>,
    ) {
        let level_field = &self.options.level_field;
        let order_field = &self.options.order_field;
        let has_children_field = &self.options.has_children_field;
        for (pos, &i) in group.iter().enumerate() {
            let mut record = items[i].clone();
            if num_unset(&record, level_field) {
                record.set(level_field.clone(), depth);
            }
            if reorder {
                record.set(order_field.clone(), (pos + 1) as i64);
            }
            let kids = children.get(&i);
            if kids.is_some_and(|k| !k.is_empty()) {
                record.set(has_children_field.clone(), true);
            }
            out.push(record);
            if let Some(kids) = kids {
                self.walk_preorder(items, children, kids, depth + 1, reorder, out);
            }
        }
    }
}

fn build_nested(
    items: &[Record],
    children: &HashMap<usize, Vec<usize>>,
    i: usize,
    child_field: &str,
) -> Record {
    let mut record = items[i].clone();
    if let Some(kids) = children.get(&i)
        && !kids.is_empty()
    {
        let list: Vec<Value> = kids
            .iter()
            .map(|&k| Value::Map(build_nested(items, children, k, child_field)))
            .collect();
        record.set(child_field, Value::List(list));
    }
    record
}
