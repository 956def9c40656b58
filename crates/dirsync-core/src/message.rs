//! Queue payload crossing the broker boundary.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::ids::ConnectorId;
use crate::task::{Queue, TaskKind};

/// Immutable task payload: `{connector_id, task_type, queue}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    connector_id: ConnectorId,
    task_type: TaskKind,
    queue: Queue,
}

impl QueueMessage {
    /// Build a message routed to the kind's default lane.
    #[must_use]
    pub fn new(connector_id: ConnectorId, task_type: TaskKind) -> Self {
        Self {
            connector_id,
            task_type,
            queue: task_type.queue(),
        }
    }

    #[must_use]
    pub fn connector_id(&self) -> ConnectorId {
        self.connector_id
    }

    #[must_use]
    pub fn task_type(&self) -> TaskKind {
        self.task_type
    }

    #[must_use]
    pub fn queue(&self) -> Queue {
        self.queue
    }

    /// Broker deduplication id: one in-flight task per connector and lane.
    #[must_use]
    pub fn dedup_id(&self) -> String {
        self.connector_id.to_string()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ParseError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
