//! Schedule entry table.
//!
//! One mutex guards the entries and the revision counter. Critical sections
//! only touch the map; no I/O happens under the lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

use dirsync_core::ConnectorId;

/// Live timer for one connector.
#[derive(Debug)]
struct ScheduleEntry {
    period: Duration,
    revision: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Entries {
    next_revision: u64,
    closed: bool,
    by_connector: HashMap<ConnectorId, ScheduleEntry>,
}

/// Connector-keyed timer table. At most one entry per connector.
#[derive(Debug, Default)]
pub struct ScheduleTable {
    inner: Mutex<Entries>,
}

impl ScheduleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a timer with `period` unless one with the same period exists.
    ///
    /// `spawn` receives the revision of the new entry and starts its timer.
    /// A replaced entry's timer is aborted. Returns false when nothing
    /// changed or the table is closed.
    pub fn install<F>(&self, connector_id: ConnectorId, period: Duration, spawn: F) -> bool
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        let mut entries = self.inner.lock();
        if entries.closed {
            return false;
        }
        if entries
            .by_connector
            .get(&connector_id)
            .is_some_and(|entry| entry.period == period)
        {
            return false;
        }

        entries.next_revision += 1;
        let revision = entries.next_revision;
        let entry = ScheduleEntry {
            period,
            revision,
            handle: spawn(revision),
        };
        if let Some(old) = entries.by_connector.insert(connector_id, entry) {
            old.handle.abort();
        }
        true
    }

    /// Remove and stop the connector's timer. Returns the removed period.
    pub fn remove(&self, connector_id: ConnectorId) -> Option<Duration> {
        let removed = self.inner.lock().by_connector.remove(&connector_id);
        removed.map(|entry| {
            entry.handle.abort();
            entry.period
        })
    }

    /// Stop every timer, clear the table and refuse further installs.
    /// Returns `None` when already closed.
    pub fn close(&self) -> Option<usize> {
        let drained: Vec<ScheduleEntry> = {
            let mut entries = self.inner.lock();
            if entries.closed {
                return None;
            }
            entries.closed = true;
            entries.by_connector.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.handle.abort();
        }
        Some(drained.len())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Whether `revision` is still the live entry for the connector.
    #[must_use]
    pub fn is_current(&self, connector_id: ConnectorId, revision: u64) -> bool {
        self.inner
            .lock()
            .by_connector
            .get(&connector_id)
            .is_some_and(|entry| entry.revision == revision)
    }

    #[must_use]
    pub fn period(&self, connector_id: ConnectorId) -> Option<Duration> {
        self.inner
            .lock()
            .by_connector
            .get(&connector_id)
            .map(|entry| entry.period)
    }

    #[must_use]
    pub fn revision(&self, connector_id: ConnectorId) -> Option<u64> {
        self.inner
            .lock()
            .by_connector
            .get(&connector_id)
            .map(|entry| entry.revision)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().by_connector.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
