//! Where the repositories keep their records inside the document.
//!
//! - tasks: the ordered list `tasks`, one JSON record per item, newest first
//! - buckets: the whole collection as one JSON array under `bucketsMap["buckets"]`
//!
//! Records that do not parse are skipped with a warning; one bad record from a peer
//! must not hide every other record.
//!
//! Updating a task tombstones its item and inserts a new one, so two replicas that
//! update the same task concurrently leave two items with the same id. Reads show
//! one of them: the item inserted by the greatest op id. Mutations address every
//! copy, which collapses them again.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::position::cmp_position;
use crate::domain::{Bucket, ProjectId, StoreError, Task, TaskId, initial_buckets};
use crate::replica::{Document, OpId, Transaction};

pub(crate) const TASKS: &str = "tasks";
pub(crate) const BUCKETS_MAP: &str = "bucketsMap";
pub(crate) const BUCKETS_KEY: &str = "buckets";

/// All items holding one task id.
#[derive(Debug, Clone)]
pub(crate) struct TaskCopies {
    /// Item ids in document order.
    pub(crate) items: Vec<OpId>,
    /// Record of the item with the greatest id.
    pub(crate) task: Task,
    winner: OpId,
}

/// Tasks grouped by id, in order of their first item.
pub(crate) fn task_copies(doc: &Document) -> Vec<TaskCopies> {
    let mut groups: Vec<TaskCopies> = Vec::new();
    let mut by_id: HashMap<TaskId, usize> = HashMap::new();
    for (item, value) in doc.list_entries(TASKS) {
        let task = match Task::deserialize(value) {
            Ok(task) => task,
            Err(e) => {
                warn!(?item, error = %e, "skipping unreadable task record");
                continue;
            }
        };
        match by_id.get(&task.id).and_then(|&group| groups.get_mut(group)) {
            Some(copies) => {
                copies.items.push(item);
                if item > copies.winner {
                    copies.winner = item;
                    copies.task = task;
                }
            }
            None => {
                by_id.insert(task.id, groups.len());
                groups.push(TaskCopies {
                    items: vec![item],
                    task,
                    winner: item,
                });
            }
        }
    }
    groups
}

/// All tasks, one record per id.
pub(crate) fn tasks(doc: &Document) -> Vec<Task> {
    task_copies(doc).into_iter().map(|copies| copies.task).collect()
}

pub(crate) fn find_task(doc: &Document, id: TaskId) -> Option<TaskCopies> {
    task_copies(doc).into_iter().find(|copies| copies.task.id == id)
}

/// Replace every copy with one record, placed where the first copy was.
pub(crate) fn replace_task(txn: &mut Transaction<'_>, copies: &TaskCopies, value: Value) {
    remove_task(txn, copies);
    if let Some(&first) = copies.items.first() {
        txn.list_insert_after(TASKS, first, value);
    }
}

pub(crate) fn remove_task(txn: &mut Transaction<'_>, copies: &TaskCopies) {
    for &item in &copies.items {
        txn.list_delete_item(TASKS, item);
    }
}

/// The bucket collection; the seed when it was never written.
pub(crate) fn buckets(doc: &Document) -> Vec<Bucket> {
    match doc.map_get(BUCKETS_MAP, BUCKETS_KEY) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| match Bucket::deserialize(value) {
                Ok(bucket) => Some(bucket),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable bucket record");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(kind = value_kind(other), "bucket entry is not a list, ignoring it");
            Vec::new()
        }
        None => initial_buckets(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Overwrite the bucket collection. Embedded task lists are not serialized.
pub(crate) fn write_buckets(txn: &mut Transaction<'_>, buckets: &[Bucket]) -> Result<(), StoreError> {
    let value = serde_json::to_value(buckets)?;
    txn.map_set(BUCKETS_MAP, BUCKETS_KEY, value);
    Ok(())
}

/// The project's bucket with the smallest position (ties by id).
pub(crate) fn default_bucket(buckets: &[Bucket], project_id: ProjectId) -> Option<&Bucket> {
    buckets
        .iter()
        .filter(|b| b.project_id == project_id)
        .min_by(|a, b| cmp_position((a.position, a.id), (b.position, b.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::ActorId;
    use serde_json::json;

    fn task(id: i64, title: &str) -> Value {
        json!({"id": id, "projectId": 1, "bucketId": 1, "title": title, "position": 1.0})
    }

    #[test]
    fn unreadable_records_are_skipped() {
        let mut doc = Document::new(ActorId(1));
        let mut txn = doc.transact();
        txn.list_insert(TASKS, 0, task(1, "kept"));
        txn.list_insert(TASKS, 0, json!({"id": 2, "projectId": 1, "title": "bad", "position": null}));
        txn.list_insert(TASKS, 0, json!("not a record"));
        let _ = txn.commit();

        let titles: Vec<_> = tasks(&doc).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["kept"]);
        assert!(find_task(&doc, TaskId::new(2)).is_none());
    }

    #[test]
    fn copies_of_one_task_read_as_the_latest_insert() {
        let mut a = Document::new(ActorId(1));
        let mut txn = a.transact();
        txn.list_insert(TASKS, 0, task(7, "old"));
        txn.list_insert(TASKS, 1, task(8, "other"));
        let seed = txn.commit().unwrap_or_default();
        let mut b = Document::new(ActorId(2));
        b.apply_update(seed);

        let edit = |doc: &mut Document, title: &str| {
            let copies = find_task(doc, TaskId::new(7)).unwrap();
            let mut txn = doc.transact();
            replace_task(&mut txn, &copies, task(7, title));
            txn.commit().unwrap_or_default()
        };
        let from_a = edit(&mut a, "edit on a");
        let from_b = edit(&mut b, "edit on b");
        a.apply_update(from_b);
        b.apply_update(from_a);

        assert_eq!(a.list_len(TASKS), 3);
        let copies = find_task(&a, TaskId::new(7)).unwrap();
        assert_eq!(copies.items.len(), 2);
        // same counter on both sides; the greater actor wins
        assert_eq!(copies.task.title, "edit on b");
        assert_eq!(tasks(&a), tasks(&b));
        assert_eq!(tasks(&a).len(), 2);

        let mut txn = a.transact();
        replace_task(&mut txn, &copies, task(7, "merged"));
        let _ = txn.commit();
        assert_eq!(a.list_len(TASKS), 2);
        assert_eq!(find_task(&a, TaskId::new(7)).unwrap().items.len(), 1);
    }

    #[test]
    fn non_list_bucket_entry_reads_as_empty() {
        let mut doc = Document::new(ActorId(1));
        let mut txn = doc.transact();
        txn.map_set(BUCKETS_MAP, BUCKETS_KEY, json!([{"id": 3, "projectId": 1, "title": "ok"}, {"id": "x"}]));
        let _ = txn.commit();
        assert_eq!(buckets(&doc).len(), 1);

        let mut txn = doc.transact();
        txn.map_set(BUCKETS_MAP, BUCKETS_KEY, json!({"broken": true}));
        let _ = txn.commit();
        assert!(buckets(&doc).is_empty());
    }
}
