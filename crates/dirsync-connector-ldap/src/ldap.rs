//! `ldap3` implementation of the directory seams.

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{
    DerefAliases, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry,
    SearchOptions,
};
use tracing::{debug, instrument, warn};

use dirsync_connector::entry::DirectoryEntry;
use dirsync_connector::error::{ConnectorError, ConnectorResult};

use crate::client::{BindCredentials, DirectoryDialer, DirectorySession, Endpoint};
use crate::search::{Page, PageRequest};

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Dials LDAP servers with `ldap3`.
#[derive(Debug, Clone, Default)]
pub struct LdapDialer {
    tls_skip_verify: bool,
}

impl LdapDialer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip certificate verification for STARTTLS and LDAPS.
    #[must_use]
    pub fn with_tls_skip_verify(mut self, skip: bool) -> Self {
        self.tls_skip_verify = skip;
        self
    }
}

#[async_trait]
impl DirectoryDialer for LdapDialer {
    #[instrument(skip(self), fields(url = %endpoint.url))]
    async fn dial(&self, endpoint: &Endpoint) -> ConnectorResult<Box<dyn DirectorySession>> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(endpoint.connect_timeout)
            .set_starttls(endpoint.start_tls)
            .set_no_tls_verify(self.tls_skip_verify);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &endpoint.url)
            .await
            .map_err(|e| match e {
                LdapError::Timeout { .. } => ConnectorError::ConnectionTimeout {
                    timeout_ms: u64::try_from(endpoint.connect_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                },
                other => ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", endpoint.url),
                    other,
                ),
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        debug!("LDAP connection established");
        Ok(Box::new(LdapSession {
            ldap,
            url: endpoint.url.clone(),
        }))
    }
}

/// One `ldap3` connection.
pub struct LdapSession {
    ldap: Ldap,
    url: String,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, credentials: &BindCredentials) -> ConnectorResult<()> {
        let result = self
            .ldap
            .simple_bind(&credentials.dn, credentials.password())
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("LDAP bind failed for {}", credentials.dn),
                    e,
                )
            })?;

        match result.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(ConnectorError::AuthenticationFailed {
                bind_dn: credentials.dn.clone(),
            }),
            rc => Err(ConnectorError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    async fn search_page(&mut self, request: &PageRequest) -> ConnectorResult<Page> {
        let time_limit = i32::try_from(request.time_limit.as_secs())
            .unwrap_or(i32::MAX)
            .max(1);
        let size = i32::try_from(request.page_size).unwrap_or(i32::MAX);

        let result = self
            .ldap
            .with_search_options(
                SearchOptions::new()
                    .deref(DerefAliases::Never)
                    .timelimit(time_limit),
            )
            .with_controls(PagedResults {
                size,
                cookie: request.cookie.clone().unwrap_or_default(),
            })
            .with_timeout(request.time_limit)
            .search(
                &request.base_dn,
                Scope::OneLevel,
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .map_err(|e| ConnectorError::search_failed_with_source("LDAP search failed", e))?;

        let (entries, done) = result.success().map_err(|e| {
            ConnectorError::search_failed_with_source(format!("LDAP search on {} failed", self.url), e)
        })?;

        let cookie = done.ctrls.iter().find_map(|ctrl| match ctrl {
            Control(Some(ControlType::PagedResults), raw) => {
                Some(raw.parse::<PagedResults>().cookie)
            }
            _ => None,
        });

        let entries = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attrs: entry.attrs,
            })
            .collect();

        Ok(Page { entries, cookie })
    }

    async fn close(&mut self) -> ConnectorResult<()> {
        self.ldap.unbind().await.map_err(|e| {
            ConnectorError::connection_failed_with_source(format!("LDAP unbind on {} failed", self.url), e)
        })
    }
}
