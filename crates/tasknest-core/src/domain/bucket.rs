//! Kanban bucket record.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BucketId, ProjectId};
use super::errors::StoreError;
use super::position::{DEFAULT_POSITION, ensure_finite};
use super::task::Task;
use super::user::User;

/// Project that owns the seeded bucket of a fresh store.
pub const DEFAULT_PROJECT_ID: ProjectId = ProjectId::new(1);

/// A bucket of a project's kanban board.
///
/// `tasks` is derived on read (the bucket's tasks by ascending `kanbanPosition`) and is
/// never written to the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: BucketId,
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub is_done_bucket: bool,
    #[serde(default)]
    pub created_by: User,
    #[serde(default, skip_serializing)]
    pub tasks: Vec<Task>,
}

impl Bucket {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Default::default()
        }
    }

    /// The "Backlog" bucket a project starts with.
    pub fn backlog(id: BucketId, project_id: ProjectId, position: f64) -> Self {
        Self {
            id,
            project_id,
            title: "Backlog".to_string(),
            position,
            ..Default::default()
        }
    }

    pub fn without_tasks(mut self) -> Self {
        self.tasks = Vec::new();
        self
    }

    pub fn check_numbers(&self) -> Result<(), StoreError> {
        ensure_finite("position", self.position)
    }
}

/// Bucket collection of a store whose bucket entry has never been written.
///
/// Built fresh on every call so callers can mutate the result freely.
pub fn initial_buckets() -> Vec<Bucket> {
    let mut backlog = Bucket::backlog(BucketId::new(1), DEFAULT_PROJECT_ID, DEFAULT_POSITION);
    backlog.created_by = User {
        id: 1,
        name: String::new(),
        username: "demo".to_string(),
        created: Utc.with_ymd_and_hms(2021, 5, 30, 8, 45, 25).single(),
        updated: Utc.with_ymd_and_hms(2023, 3, 16, 10, 55, 59).single(),
    };
    vec![backlog]
}
