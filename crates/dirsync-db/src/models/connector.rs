//! Connector model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use dirsync_connector::error::ConnectorError;
use dirsync_connector::model::Connector;
use dirsync_connector::types::ConnectorType;

use crate::error::DbError;

/// Row of the `connectors` table.
#[derive(Debug, Clone, FromRow)]
pub struct ConnectorRow {
    pub id: i64,
    pub connector_type: String,
    pub display_name: String,
    pub enabled: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectorRow {
    pub async fn find_by_id(pool: &sqlx::PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT id, connector_type, display_name, enabled, last_sync, data,
                   created_at, updated_at
            FROM connectors
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_enabled(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT id, connector_type, display_name, enabled, last_sync, data,
                   created_at, updated_at
            FROM connectors
            WHERE enabled = TRUE
            ORDER BY id
            ",
        )
        .fetch_all(pool)
        .await
    }

    /// Write the sync watermark. Returns false when the row is gone.
    pub async fn record_sync(
        pool: &sqlx::PgPool,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE connectors
            SET last_sync = $2, updated_at = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Convert into the domain model.
    pub fn into_connector(self) -> Result<Connector, DbError> {
        let connector_type: ConnectorType = self
            .connector_type
            .parse()
            .map_err(|e: ConnectorError| DbError::ValidationFailed(e.to_string()))?;

        Ok(Connector {
            id: super::connector_id(self.id)?,
            connector_type,
            display_name: self.display_name,
            enabled: self.enabled,
            last_sync: self.last_sync,
            data: self.data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
