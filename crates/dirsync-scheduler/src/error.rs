//! Scheduler error types.

use thiserror::Error;

use dirsync_connector::error::ConnectorError;
use dirsync_core::ConnectorId;
use dirsync_queue::QueueError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Loading or parsing one connector failed.
    #[error("connector {connector_id}: {source}")]
    Connector {
        connector_id: ConnectorId,
        #[source]
        source: ConnectorError,
    },

    /// Listing enabled connectors failed.
    #[error("failed to list connectors: {0}")]
    ListFailed(#[source] ConnectorError),

    /// The change feed failed.
    #[error("change feed error: {0}")]
    ChangeFeed(#[source] ConnectorError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Operation attempted after shutdown.
    #[error("scheduler is shut down")]
    ShutDown,
}

impl SchedulerError {
    pub fn connector(connector_id: ConnectorId, source: ConnectorError) -> Self {
        SchedulerError::Connector {
            connector_id,
            source,
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        matches!(self, SchedulerError::ShutDown)
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
