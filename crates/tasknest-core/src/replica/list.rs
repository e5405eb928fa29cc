//! Ordered list CRDT (RGA).
//!
//! Every item remembers the item it was inserted after (`parent`). The visible order is
//! a pre-order walk of that tree where siblings are visited by descending `OpId`, so
//! the most recent insert after an item lands right behind it. The order depends only
//! on the set of inserts and tombstones, not on the order they arrived in.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::op::OpId;

#[derive(Debug, Clone)]
struct Item {
    value: Value,
}

#[derive(Debug, Default)]
pub(crate) struct ListState {
    items: HashMap<OpId, Item>,
    /// Sorted by descending `OpId`.
    children: HashMap<Option<OpId>, Vec<OpId>>,
    tombstones: HashSet<OpId>,
    visible: OnceCell<Vec<OpId>>,
}

impl ListState {
    pub(crate) fn insert(&mut self, id: OpId, parent: Option<OpId>, value: Value) {
        if self.items.contains_key(&id) {
            return;
        }
        self.items.insert(id, Item { value });
        let siblings = self.children.entry(parent).or_default();
        let at = siblings.partition_point(|sibling| *sibling > id);
        siblings.insert(at, id);
        self.visible = OnceCell::new();
    }

    /// The target may not have arrived yet; the tombstone hides it once it does.
    pub(crate) fn delete(&mut self, target: OpId) {
        if self.tombstones.insert(target) {
            self.visible = OnceCell::new();
        }
    }

    pub(crate) fn visible_ids(&self) -> &[OpId] {
        self.visible.get_or_init(|| self.walk())
    }

    pub(crate) fn len(&self) -> usize {
        self.visible_ids().len()
    }

    pub(crate) fn id_at(&self, index: usize) -> Option<OpId> {
        self.visible_ids().get(index).copied()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries().map(|(_, value)| value)
    }

    /// Visible items with the id of the op that inserted them.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (OpId, &Value)> {
        self.visible_ids()
            .iter()
            .filter_map(|id| self.items.get(id).map(|item| (*id, &item.value)))
    }

    pub(crate) fn contains(&self, id: OpId) -> bool {
        self.items.contains_key(&id)
    }

    pub(crate) fn is_visible(&self, id: OpId) -> bool {
        self.contains(id) && !self.tombstones.contains(&id)
    }

    /// Items whose parent is unknown are unreachable and stay hidden until it arrives.
    fn walk(&self) -> Vec<OpId> {
        let mut out = Vec::with_capacity(self.items.len());
        let mut stack: Vec<OpId> = self
            .children
            .get(&None)
            .map(|roots| roots.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if !self.tombstones.contains(&id) {
                out.push(id);
            }
            if let Some(kids) = self.children.get(&Some(id)) {
                stack.extend(kids.iter().rev().copied());
            }
        }
        out
    }
}
