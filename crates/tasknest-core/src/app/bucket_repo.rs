//! Bucket repository.
//!
//! The bucket collection is a single last-writer-wins entry: every mutation reads the
//! whole collection and writes it back inside one transaction.

use std::sync::Arc;

use tracing::{debug, warn};

use super::records;
use super::session::DocumentSession;
use super::task_repo::{TaskRepository, sort_by_kanban_position};
use crate::domain::position::cmp_position;
use crate::domain::{
    Bucket, BucketId, DEFAULT_POSITION, InvariantViolation, Outcome, ProjectId, StoreError,
    default_position_if_zero,
};

#[derive(Clone)]
pub struct BucketRepository {
    sessions: Arc<DocumentSession>,
    tasks: TaskRepository,
}

impl BucketRepository {
    pub fn new(sessions: Arc<DocumentSession>) -> Self {
        Self {
            tasks: TaskRepository::new(sessions.clone()),
            sessions,
        }
    }

    /// Buckets of the project by ascending position, each with its tasks by ascending
    /// kanban position.
    pub async fn list_buckets(&self, project_id: ProjectId) -> Result<Vec<Bucket>, StoreError> {
        let session = self.sessions.ensure_session().await?;
        let mut buckets: Vec<Bucket> = session
            .replica()
            .read(records::buckets)
            .await
            .into_iter()
            .filter(|bucket| bucket.project_id == project_id)
            .collect();
        buckets.sort_by(|a, b| cmp_position((a.position, a.id), (b.position, b.id)));

        for bucket in &mut buckets {
            let mut tasks = self.tasks.list_tasks_of_bucket(bucket.id).await?;
            sort_by_kanban_position(&mut tasks);
            bucket.tasks = tasks;
        }
        Ok(buckets)
    }

    /// The project's bucket with the smallest position.
    pub async fn get_default_bucket(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Bucket>, StoreError> {
        Ok(self.list_buckets(project_id).await?.into_iter().next())
    }

    /// Store a new bucket under a fresh id, positioned after every bucket in the store.
    ///
    /// NaN or infinite positions are refused with [`StoreError::NonFinite`], including a
    /// doubled maximum that overflows.
    pub async fn create_bucket(&self, bucket: Bucket) -> Result<Bucket, StoreError> {
        bucket.check_numbers()?;
        let session = self.sessions.ensure_session().await?;
        let mut bucket = bucket.without_tasks();
        bucket.id = session.ids().next_bucket_id();

        let created = session
            .replica()
            .transact(move |txn| -> Result<Bucket, StoreError> {
                let mut buckets = records::buckets(txn);
                // the maximum is taken over all projects
                let max = buckets.iter().map(|b| b.position).reduce(f64::max);
                bucket.position = max.map_or(DEFAULT_POSITION, |max| default_position_if_zero(max * 2.0));
                bucket.check_numbers()?;
                buckets.push(bucket.clone());
                records::write_buckets(txn, &buckets)?;
                Ok(bucket)
            })
            .await??;

        debug!(bucket = %created.id, position = created.position, "created bucket");
        Ok(created)
    }

    /// Replace the stored bucket with the same id. Embedded tasks are dropped.
    pub async fn update_bucket(&self, bucket: Bucket) -> Result<Outcome<Bucket>, StoreError> {
        bucket.check_numbers()?;
        let session = self.sessions.ensure_session().await?;
        let bucket = bucket.without_tasks();
        let id = bucket.id;
        let outcome = session
            .replica()
            .transact(move |txn| -> Result<Outcome<Bucket>, StoreError> {
                let mut buckets = records::buckets(txn);
                let Some(slot) = buckets.iter_mut().find(|b| b.id == id) else {
                    return Ok(Outcome::NotFound);
                };
                *slot = bucket.clone();
                records::write_buckets(txn, &buckets)?;
                Ok(Outcome::Applied(bucket))
            })
            .await??;

        if matches!(outcome, Outcome::NotFound) {
            warn!(bucket = %id, "tried to update a bucket that does not exist");
        }
        Ok(outcome)
    }

    /// Remove a bucket and move its tasks to the project's new default bucket, in one
    /// transaction.
    ///
    /// Refused while the store holds a single bucket in total, and when it is the
    /// last bucket of its project.
    pub async fn delete_bucket(&self, id: BucketId) -> Result<Outcome<()>, StoreError> {
        let session = self.sessions.ensure_session().await?;
        let outcome = session
            .replica()
            .transact(move |txn| -> Result<Outcome<BucketId>, StoreError> {
                let mut buckets = records::buckets(txn);
                if buckets.len() <= 1 {
                    return Ok(Outcome::Rejected(InvariantViolation::LastBucket));
                }
                let Some(index) = buckets.iter().position(|b| b.id == id) else {
                    return Ok(Outcome::NotFound);
                };
                let project_id = buckets[index].project_id;
                buckets.remove(index);
                let Some(default_id) = records::default_bucket(&buckets, project_id).map(|b| b.id)
                else {
                    return Ok(Outcome::Rejected(InvariantViolation::LastBucketOfProject {
                        project_id,
                    }));
                };

                // Encode everything before the first write.
                let moved: Vec<_> = records::task_copies(txn)
                    .into_iter()
                    .filter(|copies| copies.task.bucket_id == id)
                    .map(|mut copies| {
                        copies.task.bucket_id = default_id;
                        serde_json::to_value(&copies.task).map(|value| (copies, value))
                    })
                    .collect::<Result<_, _>>()?;

                records::write_buckets(txn, &buckets)?;
                for (copies, value) in moved {
                    records::replace_task(txn, &copies, value);
                }
                Ok(Outcome::Applied(default_id))
            })
            .await??;

        match &outcome {
            Outcome::Applied(default_id) => {
                debug!(bucket = %id, default = %default_id, "deleted bucket");
            }
            Outcome::NotFound => warn!(bucket = %id, "tried to delete a bucket that does not exist"),
            Outcome::Rejected(violation) => warn!(bucket = %id, %violation, "bucket deletion refused"),
        }
        Ok(outcome.map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId};
    use crate::impls::MemoryStateStore;
    use crate::ports::SequentialIdGenerator;
    use crate::replica::Origin;

    const P: ProjectId = ProjectId::new(1);

    struct Fixture {
        buckets: BucketRepository,
        tasks: TaskRepository,
    }

    fn fixture() -> Fixture {
        let sessions = Arc::new(
            DocumentSession::builder()
                .state_store(Arc::new(MemoryStateStore::new()))
                .id_generator(Arc::new(SequentialIdGenerator::new(100)))
                .build()
                .unwrap(),
        );
        Fixture {
            buckets: BucketRepository::new(sessions.clone()),
            tasks: TaskRepository::new(sessions),
        }
    }

    impl Fixture {
        async fn ids(&self, project_id: ProjectId) -> Vec<BucketId> {
            let buckets = self.buckets.list_buckets(project_id).await.unwrap();
            buckets.iter().map(|b| b.id).collect()
        }

        async fn task(&self, id: TaskId) -> Task {
            self.tasks.get_task(id).await.unwrap().unwrap()
        }

        async fn state(&self) -> Vec<u8> {
            let session = self.buckets.sessions.ensure_session().await.unwrap();
            session.replica().encode_state().await.unwrap()
        }
    }

    #[tokio::test]
    async fn fresh_store_has_one_backlog_bucket() {
        let f = fixture();
        let default = f.buckets.get_default_bucket(P).await.unwrap().unwrap();
        assert_eq!(default.id, BucketId::new(1));
        assert_eq!(default.title, "Backlog");
        assert_eq!(default.position, DEFAULT_POSITION);
        assert_eq!(default.created_by.username, "demo");
        assert_eq!(f.buckets.get_default_bucket(ProjectId::new(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_the_only_bucket_is_rejected() {
        let f = fixture();
        let before = f.state().await;
        assert_eq!(
            f.buckets.delete_bucket(BucketId::new(1)).await.unwrap(),
            Outcome::Rejected(InvariantViolation::LastBucket)
        );
        assert_eq!(f.ids(P).await, vec![BucketId::new(1)]);
        assert_eq!(f.state().await, before);
    }

    #[tokio::test]
    async fn new_buckets_double_the_highest_position() {
        let f = fixture();
        let b2 = f.buckets.create_bucket(Bucket::new(P, "Doing")).await.unwrap();
        assert_eq!(b2.position, 131072.0);
        // the maximum spans every project
        let other = f
            .buckets
            .create_bucket(Bucket::new(ProjectId::new(2), "Other"))
            .await
            .unwrap();
        assert_eq!(other.position, 262144.0);
        assert_eq!(f.ids(P).await, vec![BucketId::new(1), b2.id]);
    }

    #[tokio::test]
    async fn embedded_tasks_are_never_stored() {
        let f = fixture();
        let mut input = Bucket::new(P, "Doing");
        input.tasks = vec![Task::new(P, "stowaway")];
        let created = f.buckets.create_bucket(input).await.unwrap();
        assert!(created.tasks.is_empty());

        let mut renamed = created.clone();
        renamed.title = "In progress".into();
        renamed.tasks = vec![Task::new(P, "stowaway")];
        let outcome = f.buckets.update_bucket(renamed).await.unwrap();
        assert!(outcome.applied().is_some_and(|b| b.tasks.is_empty()));

        let session = f.buckets.sessions.ensure_session().await.unwrap();
        let raw = session
            .replica()
            .read(|d| d.map_get(records::BUCKETS_MAP, records::BUCKETS_KEY).cloned())
            .await
            .unwrap();
        assert!(raw.as_array().unwrap().iter().all(|b| b.get("tasks").is_none()));
        assert!(f.tasks.list_tasks(P).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn updating_an_unknown_bucket_changes_nothing() {
        let f = fixture();
        let before = f.state().await;
        let mut ghost = Bucket::new(P, "ghost");
        ghost.id = BucketId::new(404);
        assert_eq!(f.buckets.update_bucket(ghost).await.unwrap(), Outcome::NotFound);
        assert_eq!(f.state().await, before);
    }

    #[tokio::test]
    async fn deleting_a_non_default_bucket_keeps_tasks_of_the_default() {
        let f = fixture();
        let b1 = BucketId::new(1);
        let b2 = f.buckets.create_bucket(Bucket::new(P, "B2")).await.unwrap();
        let t = f.tasks.create_task(Task::new(P, "T").with_bucket(b1)).await.unwrap();

        assert!(f.buckets.delete_bucket(b2.id).await.unwrap().is_applied());
        assert_eq!(f.ids(P).await, vec![b1]);
        assert_eq!(f.task(t.id).await, t);

        assert_eq!(
            f.buckets.delete_bucket(b1).await.unwrap(),
            Outcome::Rejected(InvariantViolation::LastBucket)
        );
        assert_eq!(f.ids(P).await, vec![b1]);
    }

    #[tokio::test]
    async fn tasks_of_a_deleted_bucket_move_to_the_default() {
        let f = fixture();
        let b1 = BucketId::new(1);
        let b2 = f.buckets.create_bucket(Bucket::new(P, "B2")).await.unwrap();
        let b3 = f.buckets.create_bucket(Bucket::new(P, "B3")).await.unwrap();
        let moved = f.tasks.create_task(Task::new(P, "moved").with_bucket(b2.id)).await.unwrap();
        let stays = f.tasks.create_task(Task::new(P, "stays").with_bucket(b3.id)).await.unwrap();

        assert!(f.buckets.delete_bucket(b2.id).await.unwrap().is_applied());

        let after = f.task(moved.id).await;
        assert_eq!(after.bucket_id, b1);
        assert_eq!(Task { bucket_id: b2.id, ..after }, moved);
        assert_eq!(f.task(stays.id).await, stays);
        assert_eq!(f.ids(P).await, vec![b1, b3.id]);
    }

    #[tokio::test]
    async fn last_bucket_of_a_project_is_kept() {
        let f = fixture();
        let other = f
            .buckets
            .create_bucket(Bucket::new(ProjectId::new(2), "Only"))
            .await
            .unwrap();
        let before = f.state().await;

        assert_eq!(
            f.buckets.delete_bucket(other.id).await.unwrap(),
            Outcome::Rejected(InvariantViolation::LastBucketOfProject {
                project_id: ProjectId::new(2)
            })
        );
        assert_eq!(f.state().await, before);
    }

    #[tokio::test]
    async fn deleting_an_unknown_bucket_is_not_found() {
        let f = fixture();
        f.buckets.create_bucket(Bucket::new(P, "B2")).await.unwrap();
        assert_eq!(
            f.buckets.delete_bucket(BucketId::new(404)).await.unwrap(),
            Outcome::NotFound
        );
    }

    #[tokio::test]
    async fn listed_buckets_and_their_tasks_are_ordered() {
        let f = fixture();
        let b2 = f.buckets.create_bucket(Bucket::new(P, "B2")).await.unwrap();
        let mut moved_first = b2.clone();
        moved_first.position = 1.0;
        assert!(f.buckets.update_bucket(moved_first).await.unwrap().is_applied());
        for kanban in [30.0, 10.0, 20.0] {
            f.tasks
                .create_task(Task::new(P, "t").with_bucket(b2.id).with_kanban_position(kanban))
                .await
                .unwrap();
        }

        let buckets = f.buckets.list_buckets(P).await.unwrap();
        assert!(buckets.windows(2).all(|w| w[0].position <= w[1].position));
        assert_eq!(buckets[0].id, b2.id);
        let kanban: Vec<_> = buckets[0].tasks.iter().map(|t| t.kanban_position).collect();
        assert_eq!(kanban, vec![10.0, 20.0, 30.0]);
        assert_eq!(
            f.buckets.get_default_bucket(P).await.unwrap().map(|b| b.id),
            Some(b2.id)
        );
    }

    #[tokio::test]
    async fn non_finite_positions_are_refused() {
        let f = fixture();
        let before = f.state().await;
        let mut nan = Bucket::new(P, "nan");
        nan.position = f64::NAN;
        assert!(matches!(
            f.buckets.create_bucket(nan).await,
            Err(StoreError::NonFinite { field: "position", .. })
        ));

        let mut seed = f.buckets.get_default_bucket(P).await.unwrap().unwrap();
        seed.position = f64::INFINITY;
        assert!(matches!(
            f.buckets.update_bucket(seed).await,
            Err(StoreError::NonFinite { .. })
        ));
        assert_eq!(f.state().await, before);
        assert_eq!(f.ids(P).await, vec![BucketId::new(1)]);
    }

    #[tokio::test]
    async fn doubling_past_the_float_range_is_refused() {
        let f = fixture();
        let mut seed = f.buckets.get_default_bucket(P).await.unwrap().unwrap();
        seed.position = f64::MAX;
        assert!(f.buckets.update_bucket(seed).await.unwrap().is_applied());
        let before = f.state().await;

        assert!(matches!(
            f.buckets.create_bucket(Bucket::new(P, "next")).await,
            Err(StoreError::NonFinite { .. })
        ));
        assert_eq!(f.state().await, before);
    }

    async fn exchange(x: &Fixture, y: &Fixture) {
        let (sx, sy) = (
            x.buckets.sessions.ensure_session().await.unwrap(),
            y.buckets.sessions.ensure_session().await.unwrap(),
        );
        let (from_x, from_y) = (x.state().await, y.state().await);
        sx.replica().apply_update(&from_y, Origin::Bridge).await.unwrap();
        sy.replica().apply_update(&from_x, Origin::Bridge).await.unwrap();
    }

    #[tokio::test]
    async fn reassignment_collapses_concurrent_copies_of_a_task() {
        let (a, b) = (fixture(), fixture());
        let b2 = a.buckets.create_bucket(Bucket::new(P, "B2")).await.unwrap();
        let task = a.tasks.create_task(Task::new(P, "t").with_bucket(b2.id)).await.unwrap();
        exchange(&a, &b).await;
        a.tasks.update_task(Task { title: "on a".into(), ..task.clone() }).await.unwrap();
        b.tasks.update_task(Task { title: "on b".into(), ..task.clone() }).await.unwrap();
        exchange(&a, &b).await;

        assert!(a.buckets.delete_bucket(b2.id).await.unwrap().is_applied());
        exchange(&a, &b).await;
        for f in [&a, &b] {
            let session = f.buckets.sessions.ensure_session().await.unwrap();
            assert_eq!(session.replica().read(|d| d.list_len(records::TASKS)).await, 1);
            assert_eq!(f.task(task.id).await.bucket_id, BucketId::new(1));
        }
    }
}
