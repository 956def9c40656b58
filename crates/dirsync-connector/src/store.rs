//! Storage and change-feed seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dirsync_core::{ConnectorEvent, ConnectorId};

use crate::error::{ConnectorError, ConnectorResult};
use crate::model::Connector;
use crate::user::UserRecord;

/// Result of [`ConnectorStore::list_enabled`].
#[derive(Debug, Default)]
pub struct EnabledConnectors {
    pub connectors: Vec<Connector>,
    /// Enabled rows that could not be decoded, such as an unknown type.
    pub unreadable: Vec<(ConnectorId, ConnectorError)>,
}

/// Read access to connectors plus the post-sync watermark update.
#[async_trait]
pub trait ConnectorStore: Send + Sync {
    /// Fetch one connector; `None` when it does not exist.
    async fn get(&self, id: ConnectorId) -> ConnectorResult<Option<Connector>>;

    /// All connectors with `enabled = true`. A row that fails to decode is
    /// reported in [`EnabledConnectors::unreadable`] instead of failing the
    /// whole listing.
    async fn list_enabled(&self) -> ConnectorResult<EnabledConnectors>;

    /// Set `last_sync` and `updated_at` to `at`.
    async fn record_sync(&self, id: ConnectorId, at: DateTime<Utc>) -> ConnectorResult<()>;
}

/// Bulk upsert of synced users keyed by username.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert or update `users`, returning the number of rows written.
    async fn upsert_batch(&self, users: &[UserRecord]) -> ConnectorResult<u64>;
}

/// At-least-once stream of connector lifecycle events.
#[async_trait]
pub trait ConnectorChangeFeed: Send {
    /// Next event in arrival order; `None` once the feed has closed.
    async fn next_event(&mut self) -> ConnectorResult<Option<ConnectorEvent>>;
}
