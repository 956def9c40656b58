//! Directory connection pool.
//!
//! One pool per endpoint URL, shared by every sync run against that server.
//! Checkout waits at most `max_wait` for a free slot. A returned session is
//! re-bound before it goes back to the idle list; a closed pool closes
//! returned sessions instead of keeping them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use dirsync_connector::error::{ConnectorError, ConnectorResult};

use crate::client::{BindCredentials, DirectoryDialer, DirectorySession, Endpoint};
use crate::search::{Page, PageRequest};

/// Pool sizing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum sessions checked out or idle at once.
    pub max_size: usize,

    /// How long a checkout waits for a free slot.
    pub max_wait: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            max_wait: Duration::from_secs(30),
        }
    }
}

struct PoolInner {
    endpoint: Endpoint,
    dialer: Arc<dyn DirectoryDialer>,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn DirectorySession>>>,
    closed: AtomicBool,
}

/// Bounded pool of sessions to one endpoint.
#[derive(Clone)]
pub struct DirectoryPool {
    inner: Arc<PoolInner>,
}

impl DirectoryPool {
    pub fn new(endpoint: Endpoint, dialer: Arc<dyn DirectoryDialer>, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_size.max(1)));
        Self {
            inner: Arc::new(PoolInner {
                endpoint,
                dialer,
                config,
                permits,
                idle: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Take an idle session or dial a new one.
    pub async fn checkout(&self) -> ConnectorResult<PooledSession> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let max_wait = self.inner.config.max_wait;
        let permit = match tokio::time::timeout(max_wait, self.inner.permits.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(self.closed_error()),
            Err(_) => {
                return Err(ConnectorError::PoolExhausted {
                    waited_ms: u64::try_from(max_wait.as_millis()).unwrap_or(u64::MAX),
                })
            }
        };

        let idle = self.inner.idle.lock().pop();
        let session = match idle {
            Some(session) => session,
            None => {
                debug!(url = %self.inner.endpoint.url, "Dialing new directory session");
                self.inner.dialer.dial(&self.inner.endpoint).await?
            }
        };

        Ok(PooledSession {
            session: Some(session),
            credentials: None,
            _permit: permit,
        })
    }

    /// Return a session. It re-enters the pool only if it re-binds successfully.
    pub async fn release(&self, mut pooled: PooledSession) {
        let Some(mut session) = pooled.session.take() else {
            return;
        };

        if self.is_closed() {
            close_quietly(session).await;
            return;
        }

        let Some(credentials) = pooled.credentials.take() else {
            close_quietly(session).await;
            return;
        };

        if let Err(e) = session.bind(&credentials).await {
            debug!(error = %e, url = %self.inner.endpoint.url, "Discarding session that failed liveness re-bind");
            close_quietly(session).await;
            return;
        }

        let rejected = {
            let mut idle = self.inner.idle.lock();
            if self.is_closed() || idle.len() >= self.inner.config.max_size {
                Some(session)
            } else {
                idle.push(session);
                None
            }
        };
        if let Some(session) = rejected {
            close_quietly(session).await;
        }
    }

    /// Close the pool and every idle session. Pending checkouts fail.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();
        let drained = std::mem::take(&mut *self.inner.idle.lock());
        info!(url = %self.inner.endpoint.url, idle = drained.len(), "Closing directory pool");
        for session in drained {
            close_quietly(session).await;
        }
    }

    fn closed_error(&self) -> ConnectorError {
        ConnectorError::PoolClosed {
            url: self.inner.endpoint.url.clone(),
        }
    }
}

async fn close_quietly(mut session: Box<dyn DirectorySession>) {
    if let Err(e) = session.close().await {
        debug!(error = %e, "Error closing directory session");
    }
}

/// A checked-out session. Dropping it without [`DirectoryPool::release`]
/// discards the connection and frees the slot.
pub struct PooledSession {
    session: Option<Box<dyn DirectorySession>>,
    credentials: Option<BindCredentials>,
    _permit: OwnedSemaphorePermit,
}

impl PooledSession {
    /// Bind and remember the credentials for the liveness re-bind on return.
    pub async fn bind(&mut self, credentials: &BindCredentials) -> ConnectorResult<()> {
        self.session_mut()?.bind(credentials).await?;
        self.credentials = Some(credentials.clone());
        Ok(())
    }

    pub async fn search_page(&mut self, request: &PageRequest) -> ConnectorResult<Page> {
        self.session_mut()?.search_page(request).await
    }

    fn session_mut(&mut self) -> ConnectorResult<&mut Box<dyn DirectorySession>> {
        self.session
            .as_mut()
            .ok_or_else(|| ConnectorError::connection_failed("pooled session already released"))
    }
}

/// Registry of pools keyed by endpoint URL.
pub struct DirectoryClient {
    dialer: Arc<dyn DirectoryDialer>,
    config: PoolConfig,
    pools: Mutex<HashMap<String, DirectoryPool>>,
}

impl DirectoryClient {
    pub fn new(dialer: Arc<dyn DirectoryDialer>, config: PoolConfig) -> Self {
        Self {
            dialer,
            config,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Pool for `endpoint`. A pool whose connect settings changed is replaced
    /// and closed in the background.
    pub fn pool_for(&self, endpoint: &Endpoint) -> DirectoryPool {
        let (pool, retired) = {
            let mut pools = self.pools.lock();
            match pools.get(&endpoint.url) {
                Some(pool) if pool.endpoint() == endpoint && !pool.is_closed() => {
                    return pool.clone();
                }
                _ => {}
            }
            let pool = DirectoryPool::new(endpoint.clone(), self.dialer.clone(), self.config.clone());
            let retired = pools.insert(endpoint.url.clone(), pool.clone());
            (pool, retired)
        };

        if let Some(old) = retired {
            tokio::spawn(async move { old.close().await });
        }
        pool
    }

    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }

    pub async fn close_all(&self) {
        let pools: Vec<DirectoryPool> = self.pools.lock().drain().map(|(_, p)| p).collect();
        for pool in pools {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        dials: AtomicUsize,
        binds: AtomicUsize,
        closes: AtomicUsize,
    }

    struct MockSession {
        counters: Arc<Counters>,
        fail_rebind: Arc<AtomicBool>,
        bound_once: bool,
    }

    #[async_trait]
    impl DirectorySession for MockSession {
        async fn bind(&mut self, _credentials: &BindCredentials) -> ConnectorResult<()> {
            self.counters.binds.fetch_add(1, Ordering::SeqCst);
            if self.bound_once && self.fail_rebind.load(Ordering::SeqCst) {
                return Err(ConnectorError::connection_failed("connection reset"));
            }
            self.bound_once = true;
            Ok(())
        }

        async fn search_page(&mut self, _request: &PageRequest) -> ConnectorResult<Page> {
            Ok(Page::default())
        }

        async fn close(&mut self) -> ConnectorResult<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockDialer {
        counters: Arc<Counters>,
        fail_rebind: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DirectoryDialer for MockDialer {
        async fn dial(&self, _endpoint: &Endpoint) -> ConnectorResult<Box<dyn DirectorySession>> {
            self.counters.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession {
                counters: self.counters.clone(),
                fail_rebind: self.fail_rebind.clone(),
                bound_once: false,
            }))
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            url: "ldap://dc1.corp.example".to_string(),
            connect_timeout: Duration::from_secs(5),
            start_tls: false,
        }
    }

    fn pool(max_size: usize, max_wait: Duration) -> (DirectoryPool, Arc<Counters>, Arc<AtomicBool>) {
        let counters = Arc::new(Counters::default());
        let fail_rebind = Arc::new(AtomicBool::new(false));
        let dialer = Arc::new(MockDialer {
            counters: counters.clone(),
            fail_rebind: fail_rebind.clone(),
        });
        let pool = DirectoryPool::new(endpoint(), dialer, PoolConfig { max_size, max_wait });
        (pool, counters, fail_rebind)
    }

    fn creds() -> BindCredentials {
        BindCredentials::new("cn=svc", "pw")
    }

    #[tokio::test]
    async fn test_returned_session_is_reused_after_rebind() {
        let (pool, counters, _) = pool(2, Duration::from_secs(1));

        let mut session = pool.checkout().await.unwrap();
        session.bind(&creds()).await.unwrap();
        pool.release(session).await;

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(counters.binds.load(Ordering::SeqCst), 2);

        let _again = pool.checkout().await.unwrap();
        assert_eq!(counters.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_rebind_discards_session() {
        let (pool, counters, fail_rebind) = pool(2, Duration::from_secs(1));
        let mut session = pool.checkout().await.unwrap();
        session.bind(&creds()).await.unwrap();

        fail_rebind.store(true, Ordering::SeqCst);
        pool.release(session).await;

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbound_session_is_not_pooled() {
        let (pool, counters, _) = pool(2, Duration::from_secs(1));
        let session = pool.checkout().await.unwrap();
        pool.release(session).await;
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_closes_returned_sessions() {
        let (pool, counters, _) = pool(2, Duration::from_secs(1));
        let mut session = pool.checkout().await.unwrap();
        session.bind(&creds()).await.unwrap();

        pool.close().await;
        pool.release(session).await;

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pool.checkout().await,
            Err(ConnectorError::PoolClosed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkout_waits_then_fails_when_exhausted() {
        let (pool, _, _) = pool(1, Duration::from_millis(250));
        let _held = pool.checkout().await.unwrap();

        let err = pool.checkout().await.err().unwrap();
        assert!(matches!(err, ConnectorError::PoolExhausted { waited_ms: 250 }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_dropped_session_frees_slot() {
        let (pool, _, _) = pool(1, Duration::from_millis(100));
        let held = pool.checkout().await.unwrap();
        drop(held);
        assert!(pool.checkout().await.is_ok());
    }

    #[tokio::test]
    async fn test_client_shares_pool_per_url() {
        let counters = Arc::new(Counters::default());
        let dialer = Arc::new(MockDialer {
            counters,
            fail_rebind: Arc::new(AtomicBool::new(false)),
        });
        let client = DirectoryClient::new(dialer, PoolConfig::default());

        let a = client.pool_for(&endpoint());
        let b = client.pool_for(&endpoint());
        assert!(Arc::ptr_eq(&a.inner, &b.inner));

        let mut changed = endpoint();
        changed.connect_timeout = Duration::from_secs(10);
        let c = client.pool_for(&changed);
        assert!(!Arc::ptr_eq(&a.inner, &c.inner));
        assert_eq!(client.pool_count(), 1);

        client.close_all().await;
        assert!(c.is_closed());
    }
}
