//! Storage seams backed by Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use dirsync_connector::error::ConnectorResult;
use dirsync_connector::model::Connector;
use dirsync_connector::store::{ConnectorStore, EnabledConnectors, UserStore};
use dirsync_connector::user::UserRecord;
use dirsync_core::ConnectorId;

use crate::error::DbError;
use crate::models::{connector_id, db_id, ConnectorRow, UserRow};
use crate::pool::DbPool;

/// [`ConnectorStore`] over the `connectors` table.
#[derive(Debug, Clone)]
pub struct PgConnectorStore {
    pool: DbPool,
}

impl PgConnectorStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectorStore for PgConnectorStore {
    async fn get(&self, id: ConnectorId) -> ConnectorResult<Option<Connector>> {
        let row = ConnectorRow::find_by_id(self.pool.inner(), db_id(id)?)
            .await
            .map_err(DbError::QueryFailed)?;
        Ok(row.map(ConnectorRow::into_connector).transpose()?)
    }

    async fn list_enabled(&self) -> ConnectorResult<EnabledConnectors> {
        let rows = ConnectorRow::list_enabled(self.pool.inner())
            .await
            .map_err(DbError::QueryFailed)?;

        let mut listed = EnabledConnectors {
            connectors: Vec::with_capacity(rows.len()),
            unreadable: Vec::new(),
        };
        for row in rows {
            let raw_id = row.id;
            match row.into_connector() {
                Ok(connector) => listed.connectors.push(connector),
                Err(e) => {
                    warn!(connector_id = raw_id, error = %e, "Unreadable connector row");
                    listed.unreadable.push((connector_id(raw_id)?, e.into()));
                }
            }
        }
        Ok(listed)
    }

    async fn record_sync(&self, id: ConnectorId, at: DateTime<Utc>) -> ConnectorResult<()> {
        let updated = ConnectorRow::record_sync(self.pool.inner(), db_id(id)?, at)
            .await
            .map_err(DbError::QueryFailed)?;
        if !updated {
            debug!(connector_id = %id, "Connector removed before sync watermark was written");
        }
        Ok(())
    }
}

/// [`UserStore`] over the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert_batch(&self, users: &[UserRecord]) -> ConnectorResult<u64> {
        Ok(UserRow::upsert_batch(self.pool.inner(), users).await?)
    }
}
