//! Directory session seams.

use async_trait::async_trait;
use std::time::Duration;

use dirsync_connector::config::LdapSettings;
use dirsync_connector::error::ConnectorResult;

use crate::search::{Page, PageRequest};

/// Remote endpoint a pool is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub connect_timeout: Duration,
    pub start_tls: bool,
}

impl Endpoint {
    #[must_use]
    pub fn from_settings(settings: &LdapSettings) -> Self {
        Self {
            url: settings.url.clone(),
            connect_timeout: settings.connect_timeout(),
            start_tls: settings.use_start_tls(),
        }
    }
}

/// Bind principal and cleartext password.
#[derive(Clone)]
pub struct BindCredentials {
    pub dn: String,
    password: String,
}

impl BindCredentials {
    pub fn new(dn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindCredentials")
            .field("dn", &self.dn)
            .field("password", &"***REDACTED***")
            .finish()
    }
}

/// One open connection to a directory server.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind.
    async fn bind(&mut self, credentials: &BindCredentials) -> ConnectorResult<()>;

    /// One page of a paged search.
    async fn search_page(&mut self, request: &PageRequest) -> ConnectorResult<Page>;

    /// Unbind and drop the connection.
    async fn close(&mut self) -> ConnectorResult<()>;
}

/// Opens new sessions to an endpoint.
#[async_trait]
pub trait DirectoryDialer: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> ConnectorResult<Box<dyn DirectorySession>>;
}
