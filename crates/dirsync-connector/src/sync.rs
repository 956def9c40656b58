//! Sync mode and the engine seam driven by the worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio_util::sync::CancellationToken;

use dirsync_core::TaskKind;

use crate::error::ConnectorResult;
use crate::model::Connector;

/// Enumeration mode of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every entry under the base scope.
    Full,
    /// Entries changed at or after the watermark. `None` means epoch.
    Incremental { since: Option<DateTime<Utc>> },
}

impl SyncMode {
    /// Mode for a sync task kind; `None` for kinds that never sync.
    #[must_use]
    pub fn for_task(kind: TaskKind, last_sync: Option<DateTime<Utc>>) -> Option<Self> {
        match kind {
            TaskKind::FullSync => Some(SyncMode::Full),
            TaskKind::IncrementalSync => Some(SyncMode::Incremental { since: last_sync }),
            TaskKind::Terminate => None,
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental { .. } => write!(f, "incremental"),
        }
    }
}

/// Runs one sync for a connector and returns the number of records upserted.
#[async_trait]
pub trait SyncRunner: Send + Sync {
    async fn run(
        &self,
        cancel: &CancellationToken,
        connector: &Connector,
        mode: SyncMode,
    ) -> ConnectorResult<u64>;
}
