//! Task repository.
//!
//! Reads parse the `tasks` list; every mutation is a single document transaction.
//! Updates and deletes of unknown ids leave the document untouched and return
//! [`Outcome::NotFound`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::records::{self, TASKS};
use super::session::DocumentSession;
use crate::domain::position::cmp_position;
use crate::domain::{
    Bucket, BucketId, DEFAULT_POSITION, Outcome, ProjectId, StoreError, Task, TaskId, TaskQuery,
    default_position_if_zero,
};

#[derive(Clone)]
pub struct TaskRepository {
    sessions: Arc<DocumentSession>,
}

impl TaskRepository {
    pub fn new(sessions: Arc<DocumentSession>) -> Self {
        Self { sessions }
    }

    /// Tasks of the project by ascending position.
    pub async fn list_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>, StoreError> {
        self.list_tasks_with(project_id, &TaskQuery::new()).await
    }

    /// Tasks of the project, filtered and ordered by `query`.
    pub async fn list_tasks_with(
        &self,
        project_id: ProjectId,
        query: &TaskQuery,
    ) -> Result<Vec<Task>, StoreError> {
        let session = self.sessions.ensure_session().await?;
        let mut tasks: Vec<Task> = session
            .replica()
            .read(records::tasks)
            .await
            .into_iter()
            .filter(|task| task.project_id == project_id && query.matches(task))
            .collect();
        query.sort(&mut tasks);
        Ok(tasks)
    }

    /// Tasks in the bucket, in document order. Callers sort.
    pub async fn list_tasks_of_bucket(&self, bucket_id: BucketId) -> Result<Vec<Task>, StoreError> {
        let session = self.sessions.ensure_session().await?;
        let tasks = session.replica().read(records::tasks).await;
        Ok(tasks
            .into_iter()
            .filter(|task| task.bucket_id == bucket_id)
            .collect())
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let session = self.sessions.ensure_session().await?;
        let found = session
            .replica()
            .read(|doc| records::find_task(doc, id))
            .await;
        Ok(found.map(|copies| copies.task))
    }

    /// Store a new task under a fresh id and return the stored record.
    ///
    /// Zero positions get the default. A missing bucket resolves to the project's
    /// default bucket; a project without buckets gets a "Backlog" bucket in the same
    /// transaction.
    ///
    /// NaN or infinite numbers are refused with [`StoreError::NonFinite`].
    pub async fn create_task(&self, mut task: Task) -> Result<Task, StoreError> {
        task.check_numbers()?;
        let session = self.sessions.ensure_session().await?;
        task.id = session.ids().next_task_id();
        task.position = default_position_if_zero(task.position);
        task.kanban_position = default_position_if_zero(task.kanban_position);
        let backlog_id = session.ids().next_bucket_id();

        let created = session
            .replica()
            .transact(move |txn| -> Result<Task, StoreError> {
                if task.bucket_id.is_unset() {
                    let mut buckets = records::buckets(txn);
                    match records::default_bucket(&buckets, task.project_id) {
                        Some(bucket) => task.bucket_id = bucket.id,
                        None => {
                            let backlog =
                                Bucket::backlog(backlog_id, task.project_id, DEFAULT_POSITION);
                            info!(project = %task.project_id, bucket = %backlog.id, "created backlog bucket for project");
                            task.bucket_id = backlog.id;
                            buckets.push(backlog);
                            records::write_buckets(txn, &buckets)?;
                        }
                    }
                }
                txn.list_insert(TASKS, 0, serde_json::to_value(&task)?);
                Ok(task)
            })
            .await??;

        debug!(task = %created.id, bucket = %created.bucket_id, "created task");
        Ok(created)
    }

    /// Replace the stored record with the same id. Copies left by concurrent updates on
    /// other replicas are replaced too.
    pub async fn update_task(&self, task: Task) -> Result<Outcome<Task>, StoreError> {
        task.check_numbers()?;
        let session = self.sessions.ensure_session().await?;
        let id = task.id;
        let outcome = session
            .replica()
            .transact(move |txn| -> Result<Outcome<Task>, StoreError> {
                let Some(copies) = records::find_task(txn, id) else {
                    return Ok(Outcome::NotFound);
                };
                records::replace_task(txn, &copies, serde_json::to_value(&task)?);
                Ok(Outcome::Applied(task))
            })
            .await??;

        if matches!(outcome, Outcome::NotFound) {
            warn!(task = %id, "tried to update a task that does not exist");
        }
        Ok(outcome)
    }

    /// Remove every copy of the task.
    pub async fn delete_task(&self, id: TaskId) -> Result<Outcome<()>, StoreError> {
        let session = self.sessions.ensure_session().await?;
        let outcome = session
            .replica()
            .transact(move |txn| -> Result<Outcome<()>, StoreError> {
                let Some(copies) = records::find_task(txn, id) else {
                    return Ok(Outcome::NotFound);
                };
                records::remove_task(txn, &copies);
                Ok(Outcome::Applied(()))
            })
            .await??;

        if matches!(outcome, Outcome::NotFound) {
            warn!(task = %id, "tried to delete a task that does not exist");
        }
        Ok(outcome)
    }
}

/// Ascending kanban position, ties by id.
pub(crate) fn sort_by_kanban_position(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| cmp_position((a.kanban_position, a.id), (b.kanban_position, b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::transport::Environment;
    use crate::domain::{SortField, SortOrder};
    use crate::impls::{LocalHost, MemorySettings, MemoryStateStore};
    use crate::ports::SequentialIdGenerator;
    use crate::replica::Origin;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::time::Duration;

    const P: ProjectId = ProjectId::new(1);

    fn repo() -> TaskRepository {
        let sessions = DocumentSession::builder()
            .state_store(Arc::new(MemoryStateStore::new()))
            .id_generator(Arc::new(SequentialIdGenerator::new(100)))
            .build()
            .unwrap();
        TaskRepository::new(Arc::new(sessions))
    }

    async fn state(repo: &TaskRepository) -> Vec<u8> {
        let session = repo.sessions.ensure_session().await.unwrap();
        session.replica().encode_state().await.unwrap()
    }

    #[tokio::test]
    async fn created_task_reads_back_equal() {
        let repo = repo();
        let mut task = Task::new(P, "write docs");
        task.due_date = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).single();
        task.extra.insert("repeatAfter".into(), serde_json::json!(3600));

        let created = repo.create_task(task).await.unwrap();
        assert_eq!(created.id, TaskId::new(100));
        assert_eq!(repo.get_task(created.id).await.unwrap(), Some(created));
    }

    #[rstest]
    #[case::zero_gets_default(0.0, DEFAULT_POSITION)]
    #[case::kept(42.5, 42.5)]
    #[case::negative_kept(-1.0, -1.0)]
    #[tokio::test]
    async fn zero_positions_get_the_default(#[case] given: f64, #[case] stored: f64) {
        let repo = repo();
        let created = repo
            .create_task(Task::new(P, "t").with_position(given).with_kanban_position(given))
            .await
            .unwrap();
        assert_eq!(created.position, stored);
        assert_eq!(created.kanban_position, stored);
    }

    #[tokio::test]
    async fn missing_bucket_resolves_to_the_default_bucket() {
        let repo = repo();
        let created = repo.create_task(Task::new(P, "t")).await.unwrap();
        assert_eq!(created.bucket_id, BucketId::new(1));

        let explicit = repo
            .create_task(Task::new(P, "t").with_bucket(BucketId::new(7)))
            .await
            .unwrap();
        assert_eq!(explicit.bucket_id, BucketId::new(7));
    }

    #[tokio::test]
    async fn project_without_buckets_gets_a_backlog() {
        let repo = repo();
        let other = ProjectId::new(2);
        let created = repo.create_task(Task::new(other, "t")).await.unwrap();

        let session = repo.sessions.ensure_session().await.unwrap();
        let buckets = session.replica().read(records::buckets).await;
        let backlog = records::default_bucket(&buckets, other).unwrap();
        assert_eq!(backlog.title, "Backlog");
        assert_eq!(created.bucket_id, backlog.id);
        // the seed bucket of project 1 is kept
        assert!(records::default_bucket(&buckets, P).is_some());
    }

    #[tokio::test]
    async fn new_tasks_go_to_the_head_of_the_list() {
        let repo = repo();
        let first = repo.create_task(Task::new(P, "first")).await.unwrap();
        let second = repo.create_task(Task::new(P, "second")).await.unwrap();

        let in_bucket = repo.list_tasks_of_bucket(BucketId::new(1)).await.unwrap();
        let ids: Vec<_> = in_bucket.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn project_list_is_ordered_by_position_then_id() {
        let repo = repo();
        let c = repo.create_task(Task::new(P, "c").with_position(300.0)).await.unwrap();
        let a = repo.create_task(Task::new(P, "a").with_position(100.0)).await.unwrap();
        let b1 = repo.create_task(Task::new(P, "b1").with_position(200.0)).await.unwrap();
        let b2 = repo.create_task(Task::new(P, "b2").with_position(200.0)).await.unwrap();
        repo.create_task(Task::new(ProjectId::new(9), "elsewhere")).await.unwrap();

        let ids: Vec<_> = repo.list_tasks(P).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b1.id, b2.id, c.id]);
    }

    #[tokio::test]
    async fn queries_filter_by_start_date_and_sort() {
        let repo = repo();
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).single();
        for (title, start, done) in [("early", day(1), false), ("mid", day(10), true), ("late", day(20), false), ("undated", None, false)] {
            let mut task = Task::new(P, title);
            task.start_date = start;
            task.done = done;
            repo.create_task(task).await.unwrap();
        }

        let query = TaskQuery::new()
            .start_between(day(5), day(25), true)
            .sort_by(SortField::Done, SortOrder::Desc)
            .sort_by(SortField::StartDate, SortOrder::Asc);
        let titles: Vec<_> = repo
            .list_tasks_with(P, &query)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["mid", "late", "undated"]);
    }

    #[tokio::test]
    async fn update_replaces_the_whole_record() {
        let repo = repo();
        let mut task = repo.create_task(Task::new(P, "draft")).await.unwrap();
        task.title = "final".into();
        task.done = true;
        task.labels.clear();

        let outcome = repo.update_task(task.clone()).await.unwrap();
        assert_eq!(outcome, Outcome::Applied(task.clone()));
        assert_eq!(repo.get_task(task.id).await.unwrap(), Some(task));
    }

    #[tokio::test]
    async fn unknown_ids_leave_the_document_unchanged() {
        let repo = repo();
        repo.create_task(Task::new(P, "keep")).await.unwrap();
        let before = state(&repo).await;

        let mut ghost = Task::new(P, "ghost");
        ghost.id = TaskId::new(999);
        assert_eq!(repo.update_task(ghost).await.unwrap(), Outcome::NotFound);
        assert_eq!(repo.delete_task(TaskId::new(999)).await.unwrap(), Outcome::NotFound);
        assert_eq!(state(&repo).await, before);
    }

    #[tokio::test]
    async fn delete_removes_only_the_addressed_task() {
        let repo = repo();
        let gone = repo.create_task(Task::new(P, "gone")).await.unwrap();
        let kept = repo.create_task(Task::new(P, "kept")).await.unwrap();

        assert!(repo.delete_task(gone.id).await.unwrap().is_applied());
        assert_eq!(repo.get_task(gone.id).await.unwrap(), None);
        assert_eq!(repo.list_tasks(P).await.unwrap(), vec![kept]);
    }

    #[rstest]
    #[case::nan_position(Task::new(P, "t").with_position(f64::NAN))]
    #[case::infinite_kanban_position(Task::new(P, "t").with_kanban_position(f64::INFINITY))]
    #[case::nan_percent_done(Task { percent_done: f64::NAN, ..Task::new(P, "t") })]
    #[tokio::test]
    async fn non_finite_numbers_are_refused(#[case] bad: Task) {
        let repo = repo();
        let kept = repo.create_task(Task::new(P, "kept")).await.unwrap();
        let before = state(&repo).await;

        assert!(matches!(
            repo.create_task(bad.clone()).await,
            Err(StoreError::NonFinite { .. })
        ));
        let mut bad_update = bad;
        bad_update.id = kept.id;
        assert!(matches!(
            repo.update_task(bad_update).await,
            Err(StoreError::NonFinite { .. })
        ));

        assert_eq!(state(&repo).await, before);
        assert_eq!(repo.list_tasks(P).await.unwrap(), vec![kept.clone()]);
        assert_eq!(repo.get_task(kept.id).await.unwrap(), Some(kept));
    }

    #[tokio::test]
    async fn an_unreadable_record_does_not_hide_the_others() {
        let repo = repo();
        let kept = repo.create_task(Task::new(P, "kept")).await.unwrap();
        let session = repo.sessions.ensure_session().await.unwrap();
        session
            .replica()
            .transact(|t| {
                t.list_insert(
                    TASKS,
                    0,
                    serde_json::json!({"id": 5, "projectId": 1, "title": "bad", "position": null}),
                )
            })
            .await
            .unwrap();

        assert_eq!(repo.list_tasks(P).await.unwrap(), vec![kept.clone()]);
        assert_eq!(repo.get_task(kept.id).await.unwrap(), Some(kept.clone()));
        assert_eq!(repo.get_task(TaskId::new(5)).await.unwrap(), None);
        assert_eq!(repo.delete_task(TaskId::new(5)).await.unwrap(), Outcome::NotFound);
        assert!(repo.delete_task(kept.id).await.unwrap().is_applied());
    }

    /// Send each side's full state to the other.
    async fn exchange(a: &TaskRepository, b: &TaskRepository) {
        let (sa, sb) = (
            a.sessions.ensure_session().await.unwrap(),
            b.sessions.ensure_session().await.unwrap(),
        );
        let (from_a, from_b) = (
            sa.replica().encode_state().await.unwrap(),
            sb.replica().encode_state().await.unwrap(),
        );
        sa.replica().apply_update(&from_b, Origin::Bridge).await.unwrap();
        sb.replica().apply_update(&from_a, Origin::Bridge).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_offline_updates_leave_one_task_that_deletes_cleanly() {
        let (a, b) = (repo(), repo());
        let task = a.create_task(Task::new(P, "shared")).await.unwrap();
        let other = a.create_task(Task::new(P, "other").with_position(1.0)).await.unwrap();
        exchange(&a, &b).await;

        let edit = |title: &str| Task {
            title: title.to_string(),
            ..task.clone()
        };
        assert!(a.update_task(edit("edit on a")).await.unwrap().is_applied());
        assert!(b.update_task(edit("edit on b")).await.unwrap().is_applied());
        exchange(&a, &b).await;

        let (la, lb) = (a.list_tasks(P).await.unwrap(), b.list_tasks(P).await.unwrap());
        assert_eq!(la, lb);
        assert_eq!(la.len(), 2);
        assert_eq!(la.iter().filter(|t| t.id == task.id).count(), 1);

        assert!(a.delete_task(task.id).await.unwrap().is_applied());
        assert_eq!(a.get_task(task.id).await.unwrap(), None);
        exchange(&a, &b).await;
        assert_eq!(b.get_task(task.id).await.unwrap(), None);
        assert_eq!(b.list_tasks(P).await.unwrap(), vec![other]);
    }

    #[tokio::test]
    async fn updating_collapses_concurrent_copies() {
        let (a, b) = (repo(), repo());
        let task = a.create_task(Task::new(P, "shared")).await.unwrap();
        exchange(&a, &b).await;
        a.update_task(Task { title: "a".into(), ..task.clone() }).await.unwrap();
        b.update_task(Task { title: "b".into(), ..task.clone() }).await.unwrap();
        exchange(&a, &b).await;

        let last = Task { title: "last".into(), ..task.clone() };
        assert!(a.update_task(last.clone()).await.unwrap().is_applied());
        let session = a.sessions.ensure_session().await.unwrap();
        assert_eq!(session.replica().read(|d| d.list_len(TASKS)).await, 1);
        assert_eq!(a.get_task(task.id).await.unwrap(), Some(last));
    }

    #[tokio::test]
    async fn tasks_created_on_two_bridged_replicas_converge() {
        let host = LocalHost::new();
        let replica_repo = |addr: &str, first_id: i64| {
            let env = Environment::local(Arc::new(MemorySettings::new()))
                .with_host(Arc::new(host.endpoint(addr)));
            let sessions = DocumentSession::builder()
                .state_store(Arc::new(MemoryStateStore::new()))
                .environment(env)
                .id_generator(Arc::new(SequentialIdGenerator::new(first_id)))
                .build()
                .unwrap();
            TaskRepository::new(Arc::new(sessions))
        };
        let a = replica_repo("a", 1000);
        let b = replica_repo("b", 2000);

        a.create_task(Task::new(P, "from a").with_position(1.0)).await.unwrap();
        b.create_task(Task::new(P, "from b").with_position(2.0)).await.unwrap();

        for _ in 0..200 {
            let (la, lb) = (a.list_tasks(P).await.unwrap(), b.list_tasks(P).await.unwrap());
            if la.len() == 2 && la == lb {
                assert_eq!(la[0].title, "from a");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task lists did not converge");
    }
}
