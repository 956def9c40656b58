//! Directory sync engine.
//!
//! Enumerates one connector's base DN page by page and upserts each page as
//! one batch. Cancellation is observed before every page fetch and while the
//! fetch is in flight. The pooled session is always handed back to its pool.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use dirsync_connector::config::{ConnectorSettings, LdapSettings};
use dirsync_connector::crypto::CredentialCipher;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::model::Connector;
use dirsync_connector::store::UserStore;
use dirsync_connector::sync::{SyncMode, SyncRunner};
use dirsync_connector::user::UserRecord;

use crate::client::{BindCredentials, Endpoint};
use crate::pool::{DirectoryClient, PooledSession};
use crate::search::{sync_filter, PageRequest};

/// Drives paged enumeration of a directory into the user store.
pub struct DirectorySyncEngine {
    client: Arc<DirectoryClient>,
    users: Arc<dyn UserStore>,
    cipher: Arc<CredentialCipher>,
}

impl DirectorySyncEngine {
    pub fn new(
        client: Arc<DirectoryClient>,
        users: Arc<dyn UserStore>,
        cipher: Arc<CredentialCipher>,
    ) -> Self {
        Self {
            client,
            users,
            cipher,
        }
    }

    /// Run one sync and return the number of records upserted.
    #[instrument(skip(self, cancel, connector), fields(connector_id = %connector.id, mode = %mode))]
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        connector: &Connector,
        mode: SyncMode,
    ) -> ConnectorResult<u64> {
        let settings = match connector.settings()? {
            ConnectorSettings::Ldap(settings) => settings,
        };
        let password = self
            .cipher
            .decrypt_from_base64(&settings.system_account_password)?;
        let credentials = BindCredentials::new(settings.system_account_dn.clone(), password);

        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }

        let pool = self.client.pool_for(&Endpoint::from_settings(&settings));
        let mut session = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ConnectorError::Cancelled),
            session = pool.checkout() => session?,
        };

        let outcome = self
            .enumerate(cancel, &mut session, connector, &settings, &credentials, mode)
            .await;
        pool.release(session).await;

        match &outcome {
            Ok(total) => info!(total, "Directory sync finished"),
            Err(ConnectorError::Cancelled) => info!("Directory sync cancelled"),
            Err(_) => {}
        }
        outcome
    }

    async fn enumerate(
        &self,
        cancel: &CancellationToken,
        session: &mut PooledSession,
        connector: &Connector,
        settings: &LdapSettings,
        credentials: &BindCredentials,
        mode: SyncMode,
    ) -> ConnectorResult<u64> {
        session.bind(credentials).await?;

        let mapping = settings.mapping();
        let mut request = PageRequest {
            base_dn: settings.base_dn.clone(),
            filter: sync_filter(mode, &mapping),
            attributes: mapping.requested_attributes(),
            page_size: settings.sync_settings.batch_size,
            time_limit: settings.read_timeout(),
            cookie: None,
        };
        debug!(filter = %request.filter, base_dn = %request.base_dn, "Starting paged search");

        let mut total: u64 = 0;
        let mut pages: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }

            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ConnectorError::Cancelled),
                page = session.search_page(&request) => page?,
            };
            pages += 1;

            if page.entries.is_empty() {
                debug!(pages, total, "Empty page, end of traversal");
                break;
            }

            let users: Vec<UserRecord> = page
                .entries
                .iter()
                .filter_map(|entry| mapping.map_entry(entry, connector.id))
                .collect();
            if !users.is_empty() {
                self.users.upsert_batch(&users).await?;
                total += users.len() as u64;
            }
            debug!(page = pages, batch = users.len(), total, "Page reconciled");

            match page.next_cookie() {
                Some(cookie) => request.cookie = Some(cookie),
                None => break,
            }
        }

        Ok(total)
    }
}

#[async_trait]
impl SyncRunner for DirectorySyncEngine {
    async fn run(
        &self,
        cancel: &CancellationToken,
        connector: &Connector,
        mode: SyncMode,
    ) -> ConnectorResult<u64> {
        DirectorySyncEngine::run(self, cancel, connector, mode).await
    }
}
