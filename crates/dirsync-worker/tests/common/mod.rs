//! Shared fixtures for worker tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::model::Connector;
use dirsync_connector::store::{ConnectorStore, EnabledConnectors};
use dirsync_connector::sync::{SyncMode, SyncRunner};
use dirsync_connector::types::ConnectorType;
use dirsync_core::{ConnectorId, Queue};
use dirsync_queue::{
    Delivery, EnqueueOptions, MemoryTaskQueue, QueueError, QueueResult, TaskHandle, TaskInfo,
    TaskQueue, TaskState,
};
use dirsync_worker::TaskExecutor;

pub const ID: ConnectorId = ConnectorId::new(42);

#[derive(Default)]
pub struct MockConnectorStore {
    connectors: Mutex<HashMap<ConnectorId, Connector>>,
}

impl MockConnectorStore {
    pub fn put(&self, connector: Connector) {
        self.connectors.lock().insert(connector.id, connector);
    }

    pub fn last_sync(&self, id: ConnectorId) -> Option<DateTime<Utc>> {
        self.connectors.lock().get(&id).and_then(|c| c.last_sync)
    }
}

#[async_trait]
impl ConnectorStore for MockConnectorStore {
    async fn get(&self, id: ConnectorId) -> ConnectorResult<Option<Connector>> {
        Ok(self.connectors.lock().get(&id).cloned())
    }

    async fn list_enabled(&self) -> ConnectorResult<EnabledConnectors> {
        Ok(EnabledConnectors {
            connectors: self
                .connectors
                .lock()
                .values()
                .filter(|c| c.enabled)
                .cloned()
                .collect(),
            unreadable: Vec::new(),
        })
    }

    async fn record_sync(&self, id: ConnectorId, at: DateTime<Utc>) -> ConnectorResult<()> {
        if let Some(connector) = self.connectors.lock().get_mut(&id) {
            connector.last_sync = Some(at);
            connector.updated_at = at;
        }
        Ok(())
    }
}

/// Broker whose every call fails as if the database were down.
pub struct UnreachableQueue;

fn unreachable<T>() -> QueueResult<T> {
    Err(QueueError::backend("connection refused"))
}

#[async_trait]
impl TaskQueue for UnreachableQueue {
    async fn enqueue(
        &self,
        _queue: Queue,
        _task_type: &str,
        _payload: Vec<u8>,
        _options: EnqueueOptions,
    ) -> QueueResult<TaskHandle> {
        unreachable()
    }

    async fn inspect(&self, _queue: Queue, _task_id: &str) -> QueueResult<TaskInfo> {
        unreachable()
    }

    async fn cancel_active(&self, _task_id: &str) -> QueueResult<u64> {
        unreachable()
    }

    async fn delete_task(&self, _queue: Queue, _task_id: &str) -> QueueResult<()> {
        unreachable()
    }

    async fn delete_delivery(&self, _delivery: &Delivery) -> QueueResult<()> {
        unreachable()
    }

    async fn claim(&self, _lanes: &[Queue]) -> QueueResult<Option<Delivery>> {
        unreachable()
    }

    async fn complete(&self, _delivery: &Delivery) -> QueueResult<()> {
        unreachable()
    }

    async fn retry(&self, _delivery: &Delivery, _error: &str) -> QueueResult<TaskState> {
        unreachable()
    }

    async fn archive(&self, _delivery: &Delivery, _error: &str) -> QueueResult<()> {
        unreachable()
    }

    async fn heartbeat(&self, _delivery: &Delivery) -> QueueResult<bool> {
        unreachable()
    }

    async fn release_stale(&self, _lease: Duration) -> QueueResult<u64> {
        unreachable()
    }
}

/// How a scripted run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Return the record count immediately.
    Succeed(u64),
    /// Wait for `release` or cancellation.
    Block,
    /// Fail with a connection error.
    Unreachable,
}

pub struct ScriptedRunner {
    full: Mutex<Behavior>,
    incremental: Mutex<Behavior>,
    pub calls: AtomicUsize,
    pub cancelled: AtomicUsize,
    pub started: Notify,
    pub release: Notify,
}

impl ScriptedRunner {
    pub fn new(full: Behavior, incremental: Behavior) -> Self {
        Self {
            full: Mutex::new(full),
            incremental: Mutex::new(incremental),
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncRunner for ScriptedRunner {
    async fn run(
        &self,
        cancel: &CancellationToken,
        _connector: &Connector,
        mode: SyncMode,
    ) -> ConnectorResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = match mode {
            SyncMode::Full => *self.full.lock(),
            SyncMode::Incremental { .. } => *self.incremental.lock(),
        };
        self.started.notify_one();

        match behavior {
            Behavior::Succeed(records) => Ok(records),
            Behavior::Unreachable => Err(ConnectorError::connection_failed("connection refused")),
            Behavior::Block => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        self.cancelled.fetch_add(1, Ordering::SeqCst);
                        Err(ConnectorError::Cancelled)
                    }
                    _ = self.release.notified() => Ok(1),
                }
            }
        }
    }
}

pub fn ldap_connector(id: ConnectorId, enabled: bool, incremental: bool) -> Connector {
    Connector {
        id,
        connector_type: ConnectorType::Ldap,
        display_name: "Corp AD".to_string(),
        enabled,
        last_sync: None,
        data: json!({
            "url": "ldap://dc1.corp.local",
            "systemAccountDn": "cn=svc,dc=corp,dc=local",
            "baseDn": "ou=people,dc=corp,dc=local",
            "syncSettings": {
                "incrementalSyncEnabled": incremental,
                "incrementalSyncPeriod": 60
            }
        }),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub struct Fixture {
    pub store: Arc<MockConnectorStore>,
    pub runner: Arc<ScriptedRunner>,
    pub queue: Arc<MemoryTaskQueue>,
    pub executor: Arc<TaskExecutor>,
}

pub fn fixture(full: Behavior, incremental: Behavior) -> Fixture {
    let store = Arc::new(MockConnectorStore::default());
    store.put(ldap_connector(ID, true, true));
    let runner = Arc::new(ScriptedRunner::new(full, incremental));
    let queue = Arc::new(MemoryTaskQueue::new());
    let executor = Arc::new(TaskExecutor::new(
        store.clone(),
        runner.clone(),
        queue.clone(),
    ));
    Fixture {
        store,
        runner,
        queue,
        executor,
    }
}
