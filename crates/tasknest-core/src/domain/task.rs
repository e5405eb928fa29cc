//! Task record as stored in the replicated task list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StoreError;
use super::ids::{BucketId, ProjectId, TaskId};
use super::position::ensure_finite;
use super::user::User;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub hex_color: String,
}

/// A task. Ordering keys and bucket membership are interpreted by the repositories;
/// the descriptive fields are carried untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub bucket_id: BucketId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub done: bool,

    /// Ordering key among the tasks of a project.
    #[serde(default)]
    pub position: f64,
    /// Ordering key among the tasks of a bucket.
    #[serde(default)]
    pub kanban_position: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub hex_color: String,
    #[serde(default)]
    pub percent_done: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Fields this crate does not know about, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// A task with an unset id, bucket and positions; ready for `create_task`.
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_bucket(mut self, bucket_id: BucketId) -> Self {
        self.bucket_id = bucket_id;
        self
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.position = position;
        self
    }

    pub fn with_kanban_position(mut self, kanban_position: f64) -> Self {
        self.kanban_position = kanban_position;
        self
    }

    /// Every numeric field must survive the JSON encoding.
    pub fn check_numbers(&self) -> Result<(), StoreError> {
        ensure_finite("position", self.position)?;
        ensure_finite("kanbanPosition", self.kanban_position)?;
        ensure_finite("percentDone", self.percent_done)
    }
}
