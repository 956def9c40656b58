//! Error types for the dirsync-db crate.

use thiserror::Error;

use dirsync_connector::error::ConnectorError;
use dirsync_queue::QueueError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// A stored row could not be converted to its domain type.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DbError {
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }
}

impl From<DbError> for ConnectorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ValidationFailed(message) => ConnectorError::invalid_config(message),
            other => ConnectorError::store_with_source("database operation failed", other),
        }
    }
}

impl From<DbError> for QueueError {
    fn from(err: DbError) -> Self {
        QueueError::backend_with_source("task_queue operation failed", err)
    }
}
