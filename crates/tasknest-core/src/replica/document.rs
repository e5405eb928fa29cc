//! The replicated document: named ordered lists and named LWW maps over an op log.
//!
//! **Convergence:** the visible content is a function of the set of applied ops only.
//! Applying an op twice is a no-op, and ops may arrive in any order, so two replicas
//! that have seen the same ops show the same content.

use std::collections::{BTreeMap, HashSet};
use std::ops::Deref;

use serde_json::{Map, Value, json};

use super::list::ListState;
use super::op::{ActorId, Op, OpId, Update};

#[derive(Debug, Default)]
struct MapState {
    entries: BTreeMap<String, (OpId, Value)>,
}

impl MapState {
    fn set(&mut self, id: OpId, key: String, value: Value) {
        match self.entries.get(&key) {
            Some((current, _)) if *current >= id => {}
            _ => {
                self.entries.insert(key, (id, value));
            }
        }
    }
}

#[derive(Debug)]
pub struct Document {
    actor: ActorId,
    /// Highest counter seen, local or remote.
    clock: u64,
    applied: HashSet<OpId>,
    /// Every applied op in application order; the full state for snapshots.
    log: Vec<Op>,
    lists: BTreeMap<String, ListState>,
    maps: BTreeMap<String, MapState>,
}

impl Document {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            clock: 0,
            applied: HashSet::new(),
            log: Vec::new(),
            lists: BTreeMap::new(),
            maps: BTreeMap::new(),
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn op_count(&self) -> usize {
        self.log.len()
    }

    /// Visible values of `list`, head first.
    pub fn list_values(&self, list: &str) -> Vec<&Value> {
        self.lists
            .get(list)
            .map(|state| state.values().collect())
            .unwrap_or_default()
    }

    /// Visible items of `list` with the id of the op that inserted each, head first.
    pub fn list_entries(&self, list: &str) -> Vec<(OpId, &Value)> {
        self.lists
            .get(list)
            .map(|state| state.entries().collect())
            .unwrap_or_default()
    }

    pub fn list_len(&self, list: &str) -> usize {
        self.lists.get(list).map(ListState::len).unwrap_or(0)
    }

    pub fn map_get(&self, map: &str, key: &str) -> Option<&Value> {
        self.maps
            .get(map)
            .and_then(|state| state.entries.get(key))
            .map(|(_, value)| value)
    }

    /// Merge a remote or stored update. Returns the ops that were new to this replica.
    pub fn apply_update(&mut self, update: Update) -> Update {
        let ops = update
            .ops
            .into_iter()
            .filter(|op| self.apply_op(op.clone()))
            .collect();
        Update { ops }
    }

    /// Everything this replica knows, as a single update.
    pub fn encode_state(&self) -> Update {
        Update {
            ops: self.log.clone(),
        }
    }

    /// Visible content as JSON: `{"lists": {name: [...]}, "maps": {name: {key: value}}}`.
    pub fn content(&self) -> Value {
        let lists: Map<String, Value> = self
            .lists
            .iter()
            .map(|(name, state)| (name.clone(), Value::Array(state.values().cloned().collect())))
            .collect();
        let maps: Map<String, Value> = self
            .maps
            .iter()
            .map(|(name, state)| {
                let entries: Map<String, Value> = state
                    .entries
                    .iter()
                    .map(|(key, (_, value))| (key.clone(), value.clone()))
                    .collect();
                (name.clone(), Value::Object(entries))
            })
            .collect();
        json!({ "lists": lists, "maps": maps })
    }

    pub fn transact(&mut self) -> Transaction<'_> {
        Transaction {
            doc: self,
            ops: Vec::new(),
        }
    }

    fn next_id(&mut self) -> OpId {
        self.clock += 1;
        OpId::new(self.clock, self.actor)
    }

    fn apply_op(&mut self, op: Op) -> bool {
        let id = op.id();
        if !self.applied.insert(id) {
            return false;
        }
        self.clock = self.clock.max(id.counter);
        match &op {
            Op::ListInsert {
                list,
                parent,
                value,
                ..
            } => self
                .lists
                .entry(list.clone())
                .or_default()
                .insert(id, *parent, value.clone()),
            Op::ListDelete { list, target, .. } => {
                self.lists.entry(list.clone()).or_default().delete(*target)
            }
            Op::MapSet {
                map, key, value, ..
            } => self
                .maps
                .entry(map.clone())
                .or_default()
                .set(id, key.clone(), value.clone()),
        }
        self.log.push(op);
        true
    }
}

/// A batch of local changes. Each change is visible to later reads in the same
/// transaction; [`Transaction::commit`] hands the batch out as one update.
pub struct Transaction<'a> {
    doc: &'a mut Document,
    ops: Vec<Op>,
}

impl Deref for Transaction<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl Transaction<'_> {
    /// Insert at visible `index` (clamped to the list length).
    pub fn list_insert(&mut self, list: &str, index: usize, value: Value) {
        let index = index.min(self.doc.list_len(list));
        let parent = match index {
            0 => None,
            i => self.doc.lists.get(list).and_then(|state| state.id_at(i - 1)),
        };
        let id = self.doc.next_id();
        self.push(Op::ListInsert {
            id,
            list: list.to_string(),
            parent,
            value,
        });
    }

    /// Returns `false` when `index` is out of range.
    pub fn list_delete(&mut self, list: &str, index: usize) -> bool {
        let Some(target) = self.doc.lists.get(list).and_then(|state| state.id_at(index)) else {
            return false;
        };
        let id = self.doc.next_id();
        self.push(Op::ListDelete {
            id,
            list: list.to_string(),
            target,
        });
        true
    }

    /// Delete-then-reinsert at the same index.
    pub fn list_replace(&mut self, list: &str, index: usize, value: Value) -> bool {
        if !self.list_delete(list, index) {
            return false;
        }
        self.list_insert(list, index, value);
        true
    }

    /// Tombstone the item inserted by `item`. Returns `false` when it is not visible.
    pub fn list_delete_item(&mut self, list: &str, item: OpId) -> bool {
        if !self.doc.lists.get(list).is_some_and(|state| state.is_visible(item)) {
            return false;
        }
        let id = self.doc.next_id();
        self.push(Op::ListDelete {
            id,
            list: list.to_string(),
            target: item,
        });
        true
    }

    /// Insert right behind the item inserted by `parent`, even if it was deleted.
    /// Returns `false` when the list never held `parent`.
    pub fn list_insert_after(&mut self, list: &str, parent: OpId, value: Value) -> bool {
        if !self.doc.lists.get(list).is_some_and(|state| state.contains(parent)) {
            return false;
        }
        let id = self.doc.next_id();
        self.push(Op::ListInsert {
            id,
            list: list.to_string(),
            parent: Some(parent),
            value,
        });
        true
    }

    pub fn map_set(&mut self, map: &str, key: &str, value: Value) {
        let id = self.doc.next_id();
        self.push(Op::MapSet {
            id,
            map: map.to_string(),
            key: key.to_string(),
            value,
        });
    }

    /// `None` when the transaction changed nothing.
    pub fn commit(self) -> Option<Update> {
        if self.ops.is_empty() {
            return None;
        }
        Some(Update { ops: self.ops })
    }

    fn push(&mut self, op: Op) {
        self.doc.apply_op(op.clone());
        self.ops.push(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(actor: u64) -> Document {
        Document::new(ActorId(actor))
    }

    fn commit(doc: &mut Document, f: impl FnOnce(&mut Transaction<'_>)) -> Update {
        let mut txn = doc.transact();
        f(&mut txn);
        txn.commit().unwrap_or_default()
    }

    #[test]
    fn index_operations_follow_visible_order() {
        let mut d = doc(1);
        commit(&mut d, |t| {
            t.list_insert("tasks", 0, json!(1));
            t.list_insert("tasks", 0, json!(0));
            t.list_insert("tasks", 2, json!(2));
            t.list_replace("tasks", 1, json!(10));
        });
        assert_eq!(d.list_values("tasks"), vec![&json!(0), &json!(10), &json!(2)]);
    }

    #[test]
    fn empty_transaction_commits_nothing() {
        let mut d = doc(1);
        let txn = d.transact();
        assert!(txn.commit().is_none());
        assert_eq!(d.op_count(), 0);
    }

    #[test]
    fn delete_out_of_range_is_refused() {
        let mut d = doc(1);
        let mut txn = d.transact();
        assert!(!txn.list_delete("tasks", 0));
        assert!(txn.commit().is_none());
    }

    #[test]
    fn concurrent_updates_converge_in_either_order() {
        let mut base = doc(1);
        let seed = commit(&mut base, |t| {
            t.list_insert("tasks", 0, json!("seed"));
            t.map_set("bucketsMap", "buckets", json!([1]));
        });

        let mut a = doc(2);
        let mut b = doc(3);
        a.apply_update(seed.clone());
        b.apply_update(seed.clone());

        let from_a = commit(&mut a, |t| {
            t.list_insert("tasks", 0, json!("a"));
            t.map_set("bucketsMap", "buckets", json!([1, 2]));
        });
        let from_b = commit(&mut b, |t| {
            t.list_replace("tasks", 0, json!("seed-b"));
            t.map_set("bucketsMap", "buckets", json!([1, 3]));
        });

        let mut x = doc(4);
        x.apply_update(seed.clone());
        x.apply_update(from_a.clone());
        x.apply_update(from_b.clone());

        let mut y = doc(5);
        y.apply_update(from_b.clone());
        y.apply_update(from_a.clone());
        y.apply_update(seed.clone());
        // duplicated delivery
        y.apply_update(from_a.clone());

        a.apply_update(from_b);
        b.apply_update(from_a);

        assert_eq!(x.content(), y.content());
        assert_eq!(a.content(), b.content());
        assert_eq!(a.content(), x.content());
        // both were inserted at the head; the later op id comes first
        assert_eq!(x.list_values("tasks"), vec![&json!("seed-b"), &json!("a")]);
        assert_eq!(x.map_get("bucketsMap", "buckets"), Some(&json!([1, 3])));
    }

    #[test]
    fn item_addressed_edits_keep_the_slot() {
        let mut d = doc(1);
        commit(&mut d, |t| {
            t.list_insert("tasks", 0, json!("c"));
            t.list_insert("tasks", 0, json!("b"));
            t.list_insert("tasks", 0, json!("a"));
        });
        let (b, _) = d.list_entries("tasks")[1];
        commit(&mut d, |t| {
            assert!(t.list_delete_item("tasks", b));
            assert!(!t.list_delete_item("tasks", b));
            assert!(t.list_insert_after("tasks", b, json!("b2")));
        });
        assert_eq!(d.list_values("tasks"), vec![&json!("a"), &json!("b2"), &json!("c")]);
    }

    #[test]
    fn reapplying_returns_no_new_ops() {
        let mut a = doc(1);
        let update = commit(&mut a, |t| t.list_insert("tasks", 0, json!(1)));
        let mut b = doc(2);
        assert_eq!(b.apply_update(update.clone()).ops.len(), 1);
        assert!(b.apply_update(update).is_empty());
    }

    #[test]
    fn local_clock_moves_past_remote_ops() {
        let mut a = doc(1);
        let mut remote = doc(2);
        for i in 0..5 {
            let u = commit(&mut remote, |t| t.list_insert("tasks", 0, json!(i)));
            a.apply_update(u);
        }
        let local = commit(&mut a, |t| t.list_insert("tasks", 0, json!("mine")));
        assert_eq!(local.ops[0].id().counter, 6);
        assert_eq!(a.list_values("tasks")[0], &json!("mine"));
    }

    #[test]
    fn state_snapshot_rebuilds_the_same_content() {
        let mut a = doc(1);
        commit(&mut a, |t| {
            t.list_insert("tasks", 0, json!({"id": 1}));
            t.list_insert("tasks", 1, json!({"id": 2}));
            t.list_delete("tasks", 0);
        });
        let mut b = doc(2);
        b.apply_update(a.encode_state());
        assert_eq!(a.content(), b.content());
    }
}
