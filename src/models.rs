use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::RepetitionRule;

/// Completion status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    /// `at` is missing only for rows written without a completion time.
    Completed { at: Option<DateTime<Utc>> },
}

/// Represents a single task in the task manager.
///
/// A recurring task is one row for every occurrence: `next_due_at` is moved
/// forward each time it is completed instead of a new task being created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    /// Unique identifier for the task.
    pub id: u64,
    /// The title of the task.
    pub name: String,
    /// Optional project or section the task belongs to.
    pub project: Option<String>,
    pub description: Option<String>,
    /// Timestamp when the task was created.
    pub created_at: DateTime<Utc>,
    /// Original due date. Informational; it never hides a task.
    pub due_date: Option<DateTime<Utc>>,
    /// Current occurrence of a recurring task.
    pub next_due_at: Option<DateTime<Utc>>,
    pub status: Status,
    pub recurrence: Option<RepetitionRule>,
    /// Bumped on every successful save; used to detect concurrent edits.
    pub version: u64,
}

impl Task {
    /// Creates an open, non-recurring task.
    pub fn new(id: u64, name: impl Into<String>, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            name: name.into(),
            project: None,
            description: None,
            created_at,
            due_date: None,
            next_due_at: None,
            status: Status::Open,
            recurrence: None,
            version: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, Status::Completed { .. })
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            Status::Completed { at } => at,
            Status::Open => None,
        }
    }
}

/// On-disk layout of a task. Completion is stored as the `completed` flag
/// plus an optional timestamp.
#[derive(Serialize, Deserialize)]
struct TaskRecord {
    id: u64,
    name: String,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    description: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    next_due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    recurrence: Option<RepetitionRule>,
    #[serde(default)]
    version: u64,
}

impl From<TaskRecord> for Task {
    fn from(r: TaskRecord) -> Self {
        let status = if r.completed {
            Status::Completed { at: r.completed_at }
        } else {
            Status::Open
        };
        Task {
            id: r.id,
            name: r.name,
            project: r.project,
            description: r.description,
            created_at: r.created_at,
            due_date: r.due_date,
            next_due_at: r.next_due_at,
            status,
            recurrence: r.recurrence,
            version: r.version,
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(t: Task) -> Self {
        let (completed, completed_at) = match t.status {
            Status::Open => (false, None),
            Status::Completed { at } => (true, at),
        };
        TaskRecord {
            id: t.id,
            name: t.name,
            project: t.project,
            description: t.description,
            created_at: t.created_at,
            due_date: t.due_date,
            next_due_at: t.next_due_at,
            completed,
            completed_at,
            recurrence: t.recurrence,
            version: t.version,
        }
    }
}
