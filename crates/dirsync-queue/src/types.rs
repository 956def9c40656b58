//! Task descriptors exchanged with the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use dirsync_core::Queue;

/// Lifecycle state of a stored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Active,
    Retry,
    Archived,
    Completed,
}

impl TaskState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Active => "active",
            TaskState::Retry => "retry",
            TaskState::Archived => "archived",
            TaskState::Completed => "completed",
        }
    }

    /// Archived or completed: the task will not run again.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, TaskState::Archived | TaskState::Completed)
    }

    /// Waiting to be claimed.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Retry)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "active" => Ok(TaskState::Active),
            "retry" => Ok(TaskState::Retry),
            "archived" => Ok(TaskState::Archived),
            "completed" => Ok(TaskState::Completed),
            _ => Err(format!("Unknown task state: {s}")),
        }
    }
}

/// Enqueue policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Task id used for deduplication within the queue.
    pub task_id: String,
    pub max_retry: u32,
    /// How long a completed task is kept. Zero removes it on completion.
    pub retention: Duration,
}

impl EnqueueOptions {
    /// Fire-and-forget: no retries, no retention.
    pub fn fire_and_forget(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            max_retry: 0,
            retention: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Reference to an enqueued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub queue: Queue,
    pub task_id: String,
}

/// Snapshot of a stored task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Broker-internal row id. A task id reused after deletion gets a new one.
    pub id: i64,
    pub queue: Queue,
    pub task_id: String,
    pub task_type: String,
    pub state: TaskState,
    pub retried: u32,
    pub max_retry: u32,
    pub last_error: Option<String>,
}

/// A claimed task handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-internal row id.
    pub id: i64,
    pub queue: Queue,
    pub task_id: String,
    pub task_type: String,
    pub payload: Vec<u8>,
    pub retried: u32,
    pub max_retry: u32,
    pub claimed_at: DateTime<Utc>,
}
