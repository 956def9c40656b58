//! Typed connector settings.
//!
//! The connector row carries an opaque JSON blob. It is parsed once into a
//! [`ConnectorSettings`] variant keyed by the connector type and validated
//! before anything is scheduled or synced.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConnectorError, ConnectorResult};
use crate::mapping::AttributeMapping;
use crate::types::ConnectorType;

/// Parsed settings, one variant per connector type.
#[derive(Debug, Clone)]
pub enum ConnectorSettings {
    Ldap(LdapSettings),
}

impl ConnectorSettings {
    /// Parse and validate the opaque configuration blob for `connector_type`.
    pub fn parse(connector_type: ConnectorType, data: &serde_json::Value) -> ConnectorResult<Self> {
        match connector_type {
            ConnectorType::Ldap => {
                let settings: LdapSettings =
                    serde_json::from_value(data.clone()).map_err(|e| {
                        ConnectorError::invalid_config(format!("malformed ldap settings: {e}"))
                    })?;
                settings.validate()?;
                Ok(ConnectorSettings::Ldap(settings))
            }
        }
    }

    #[must_use]
    pub fn sync(&self) -> &SyncSettings {
        match self {
            ConnectorSettings::Ldap(settings) => &settings.sync_settings,
        }
    }

    /// Timer period when incremental sync is enabled with a positive period.
    #[must_use]
    pub fn incremental_period(&self) -> Option<Duration> {
        self.sync().incremental_period()
    }
}

/// Batch and schedule settings shared by every connector type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Page size for directory searches and upsert batch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Whether the scheduler keeps a recurring incremental sync timer.
    #[serde(default)]
    pub incremental_sync_enabled: bool,

    /// Incremental sync period in seconds.
    #[serde(default)]
    pub incremental_sync_period: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            incremental_sync_enabled: false,
            incremental_sync_period: 0,
        }
    }
}

/// Longest accepted incremental sync period: one year.
pub const MAX_INCREMENTAL_SYNC_PERIOD_SECS: u64 = 365 * 24 * 3600;

impl SyncSettings {
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.batch_size == 0 {
            return Err(ConnectorError::invalid_config(
                "syncSettings.batchSize must be greater than zero",
            ));
        }
        if self.incremental_sync_period > MAX_INCREMENTAL_SYNC_PERIOD_SECS {
            return Err(ConnectorError::invalid_config(format!(
                "syncSettings.incrementalSyncPeriod must be at most {MAX_INCREMENTAL_SYNC_PERIOD_SECS} seconds"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn incremental_period(&self) -> Option<Duration> {
        if self.incremental_sync_enabled && self.incremental_sync_period > 0 {
            Some(Duration::from_secs(self.incremental_sync_period))
        } else {
            None
        }
    }
}

fn default_batch_size() -> u32 {
    500
}

/// Settings of an LDAP / Active Directory connector.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapSettings {
    /// Directory URL (`ldap://` or `ldaps://`).
    pub url: String,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout: u64,

    /// Per-page search time limit in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout: u64,

    /// Upgrade plain `ldap://` connections with STARTTLS.
    #[serde(default = "default_start_tls")]
    pub start_tls: bool,

    /// Bind DN of the service account.
    pub system_account_dn: String,

    /// Service account password, encrypted and base64 encoded.
    #[serde(default)]
    pub system_account_password: String,

    /// Overrides the username attribute of the mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_attribute: Option<String>,

    /// Search base DN.
    pub base_dn: String,

    #[serde(default)]
    pub sync_settings: SyncSettings,

    #[serde(default)]
    pub attribute_mapping: AttributeMapping,
}

impl std::fmt::Debug for LdapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSettings")
            .field("url", &self.url)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("start_tls", &self.start_tls)
            .field("system_account_dn", &self.system_account_dn)
            .field("system_account_password", &"***REDACTED***")
            .field("username_attribute", &self.username_attribute)
            .field("base_dn", &self.base_dn)
            .field("sync_settings", &self.sync_settings)
            .field("attribute_mapping", &self.attribute_mapping)
            .finish()
    }
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_start_tls() -> bool {
    true
}

impl LdapSettings {
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.url.is_empty() {
            return Err(ConnectorError::invalid_config("url is required"));
        }
        if !self.url.starts_with("ldap://") && !self.url.starts_with("ldaps://") {
            return Err(ConnectorError::invalid_config(format!(
                "url must use ldap:// or ldaps://, got {}",
                self.url
            )));
        }
        if self.base_dn.trim().is_empty() {
            return Err(ConnectorError::invalid_config("baseDn is required"));
        }
        if self.system_account_dn.trim().is_empty() {
            return Err(ConnectorError::invalid_config("systemAccountDn is required"));
        }
        if self.read_timeout == 0 {
            return Err(ConnectorError::invalid_config(
                "readTimeout must be greater than zero",
            ));
        }
        self.sync_settings.validate()
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// STARTTLS only applies to plain connections.
    #[must_use]
    pub fn use_start_tls(&self) -> bool {
        self.start_tls && self.url.starts_with("ldap://")
    }

    /// Attribute mapping with the username override applied.
    #[must_use]
    pub fn mapping(&self) -> AttributeMapping {
        let mut mapping = self.attribute_mapping.clone();
        if let Some(username) = self.username_attribute.as_deref().filter(|s| !s.is_empty()) {
            mapping.username = username.to_string();
        }
        mapping
    }
}
