//! Queue error types.

use thiserror::Error;

use dirsync_core::Queue;

#[derive(Debug, Error)]
pub enum QueueError {
    /// A task with the same id is still stored in the queue.
    #[error("task {task_id} already exists in queue {queue}")]
    Duplicate { queue: Queue, task_id: String },

    /// No task with this id in the queue.
    #[error("task {task_id} not found in queue {queue}")]
    NotFound { queue: Queue, task_id: String },

    /// Malformed task payload.
    #[error("invalid payload: {0}")]
    Payload(String),

    /// Broker backend failure.
    #[error("queue backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl QueueError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::Duplicate { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound { .. })
    }

    pub fn backend(message: impl Into<String>) -> Self {
        QueueError::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error with source.
    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        QueueError::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(queue: Queue, task_id: impl Into<String>) -> Self {
        QueueError::NotFound {
            queue,
            task_id: task_id.into(),
        }
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
