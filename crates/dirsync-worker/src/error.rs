//! Task error taxonomy.

use thiserror::Error;

use dirsync_connector::error::ConnectorError;
use dirsync_core::{ConnectorId, ParseError, TaskKind};

#[derive(Debug, Error)]
pub enum TaskError {
    /// Connector missing, disabled or misconfigured. Never retried.
    #[error("configuration error: {0}")]
    Configuration(#[source] ConnectorError),

    /// A higher-priority task is running for the connector. Never retried.
    #[error("connector {connector_id} is running {active}, rejecting {requested}")]
    Conflict {
        connector_id: ConnectorId,
        active: TaskKind,
        requested: TaskKind,
    },

    /// Directory or store failure.
    #[error("transport error: {0}")]
    Transport(#[source] ConnectorError),

    /// The run was cancelled by preemption or termination.
    #[error("task cancelled")]
    Cancelled,

    /// The delivery payload is not a task message.
    #[error("invalid payload: {0}")]
    Payload(#[from] ParseError),
}

impl TaskError {
    /// Whether the broker should redeliver.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Transport(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, TaskError::Conflict { .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        TaskError::Configuration(ConnectorError::invalid_config(message))
    }
}

impl From<ConnectorError> for TaskError {
    fn from(err: ConnectorError) -> Self {
        if err.is_cancelled() {
            TaskError::Cancelled
        } else if err.is_transient() {
            TaskError::Transport(err)
        } else {
            TaskError::Configuration(err)
        }
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
