//! Daemon configuration loaded from environment variables.
//!
//! Required variables must be present and valid, or the daemon exits before
//! touching the database.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use dirsync_connector_ldap::PoolConfig;
use dirsync_db::DEFAULT_CHANGE_CHANNEL;
use dirsync_worker::WorkerConfig;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

#[derive(Clone)]
pub struct Config {
    pub rust_log: String,
    pub database_url: String,
    pub database_max_connections: u32,
    /// 32-byte AES key for connector credentials, hex or base64.
    pub encryption_key: String,
    pub worker_concurrency: usize,
    pub worker_poll_interval_ms: u64,
    /// Claims not renewed within this many seconds are failed.
    pub worker_lease_secs: u64,
    pub directory_pool_size: usize,
    pub directory_pool_wait_secs: u64,
    pub directory_tls_skip_verify: bool,
    pub change_feed_channel: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("rust_log", &self.rust_log)
            .field("database_url", &"[redacted]")
            .field("database_max_connections", &self.database_max_connections)
            .field("encryption_key", &"[redacted]")
            .field("worker_concurrency", &self.worker_concurrency)
            .field("worker_poll_interval_ms", &self.worker_poll_interval_ms)
            .field("worker_lease_secs", &self.worker_lease_secs)
            .field("directory_pool_size", &self.directory_pool_size)
            .field("directory_pool_wait_secs", &self.directory_pool_wait_secs)
            .field("directory_tls_skip_verify", &self.directory_tls_skip_verify)
            .field("change_feed_channel", &self.change_feed_channel)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    /// - `CONNECTOR_ENCRYPTION_KEY` - key for stored bind passwords
    ///
    /// # Optional Variables
    ///
    /// - `RUST_LOG` (default: "info")
    /// - `DATABASE_MAX_CONNECTIONS` (default: 10)
    /// - `WORKER_CONCURRENCY` (default: 10)
    /// - `WORKER_POLL_INTERVAL_MS` (default: 1000)
    /// - `WORKER_LEASE_SECS` (default: 60)
    /// - `DIRECTORY_POOL_SIZE` (default: 4)
    /// - `DIRECTORY_POOL_WAIT_SECS` (default: 30)
    /// - `DIRECTORY_TLS_SKIP_VERIFY` (default: false)
    /// - `CHANGE_FEED_CHANNEL` (default: "connectors_changes")
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(var.to_string()))
        };

        let config = Self {
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            encryption_key: required("CONNECTOR_ENCRYPTION_KEY")?,
            worker_concurrency: parse_or(&lookup, "WORKER_CONCURRENCY", 10)?,
            worker_poll_interval_ms: parse_or(&lookup, "WORKER_POLL_INTERVAL_MS", 1000)?,
            worker_lease_secs: parse_or(&lookup, "WORKER_LEASE_SECS", 60)?,
            directory_pool_size: parse_or(&lookup, "DIRECTORY_POOL_SIZE", 4)?,
            directory_pool_wait_secs: parse_or(&lookup, "DIRECTORY_POOL_WAIT_SECS", 30)?,
            directory_tls_skip_verify: parse_bool_or(&lookup, "DIRECTORY_TLS_SKIP_VERIFY", false)?,
            change_feed_channel: lookup("CHANGE_FEED_CHANNEL")
                .unwrap_or_else(|| DEFAULT_CHANGE_CHANNEL.to_string()),
        };

        for (var, value) in [
            ("WORKER_CONCURRENCY", config.worker_concurrency),
            ("DIRECTORY_POOL_SIZE", config.directory_pool_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    var: var.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if config.worker_lease_secs < 4 {
            return Err(ConfigError::InvalidValue {
                var: "WORKER_LEASE_SECS".to_string(),
                message: "must be at least 4".to_string(),
            });
        }
        Ok(config)
    }

    /// Worker settings. Claims are renewed four times per lease.
    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.worker_concurrency,
            poll_interval_ms: self.worker_poll_interval_ms,
            lease_secs: self.worker_lease_secs,
            heartbeat_interval_ms: self.worker_lease_secs.saturating_mul(1000) / 4,
            stale_release_interval_secs: (self.worker_lease_secs / 2).max(1),
            ..WorkerConfig::default()
        }
    }

    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.directory_pool_size,
            max_wait: Duration::from_secs(self.directory_pool_wait_secs),
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_bool_or(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(var).map(|s| s.trim().to_lowercase()) {
        None => Ok(default),
        Some(s) => match s.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("expected a boolean, got {other:?}"),
            }),
        },
    }
}
