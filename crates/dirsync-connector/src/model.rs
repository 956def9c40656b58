//! Persisted connector row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use dirsync_core::ConnectorId;

use crate::config::ConnectorSettings;
use crate::error::ConnectorResult;
use crate::types::ConnectorType;

/// Identity source configuration as stored. The core only reads it and writes
/// back `last_sync` and `updated_at` after a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub connector_type: ConnectorType,
    pub display_name: String,
    pub enabled: bool,
    pub last_sync: Option<DateTime<Utc>>,
    /// Opaque configuration blob, parsed with [`Connector::settings`].
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connector {
    /// Parse and validate the typed settings.
    pub fn settings(&self) -> ConnectorResult<ConnectorSettings> {
        ConnectorSettings::parse(self.connector_type, &self.data)
    }

    /// Period of the recurring incremental sync, or `None` when the
    /// connector is disabled or incremental sync is off.
    pub fn incremental_schedule(&self) -> ConnectorResult<Option<Duration>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(self.settings()?.incremental_period())
    }
}
