//! Timer ticks.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use dirsync_core::{ConnectorId, Queue, QueueMessage, TaskKind};
use dirsync_queue::{submit, QueueResult, TaskQueue};

use crate::table::ScheduleTable;

/// Value dispatched by a timer on every firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
    pub connector_id: ConnectorId,
    /// Revision of the entry that owns the timer.
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Enqueued,
    /// A full sync is queued or running for the connector.
    FullSyncPending,
    /// An incremental sync is still queued or running.
    Duplicate,
    /// The entry was replaced or removed; the timer should stop.
    Stale,
}

/// Turns ticks into `incremental_sync` tasks. Holds no per-connector state.
#[derive(Clone)]
pub struct Ticker {
    queue: Arc<dyn TaskQueue>,
    table: Arc<ScheduleTable>,
}

impl Ticker {
    pub fn new(queue: Arc<dyn TaskQueue>, table: Arc<ScheduleTable>) -> Self {
        Self { queue, table }
    }

    pub async fn tick(&self, tick: ScheduledTick) -> QueueResult<TickOutcome> {
        let connector_id = tick.connector_id;
        if !self.table.is_current(connector_id, tick.revision) {
            return Ok(TickOutcome::Stale);
        }

        let task_id = connector_id.to_string();
        if let Some(full) = self.queue.lookup(Queue::Full, &task_id).await? {
            if !full.state.is_finished() {
                debug!(connector_id = %connector_id, state = %full.state, "Full sync pending, skipping tick");
                return Ok(TickOutcome::FullSyncPending);
            }
        }

        let message = QueueMessage::new(connector_id, TaskKind::IncrementalSync);
        match submit(self.queue.as_ref(), &message).await {
            Ok(_) => {
                info!(connector_id = %connector_id, "Incremental sync enqueued");
                Ok(TickOutcome::Enqueued)
            }
            Err(e) if e.is_duplicate() => {
                debug!(connector_id = %connector_id, "Incremental sync already queued, skipping tick");
                Ok(TickOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Fire `tick` every `period`, first after one full period. Ends when the
    /// entry goes stale or the task is aborted.
    pub(crate) async fn run_timer(self, tick: ScheduledTick, period: Duration) {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            match self.tick(tick).await {
                Ok(TickOutcome::Stale) => {
                    debug!(connector_id = %tick.connector_id, revision = tick.revision, "Timer superseded, stopping");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(connector_id = %tick.connector_id, error = %e, "Failed to enqueue incremental sync");
                }
            }
        }
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("entries", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_queue::MemoryTaskQueue;

    fn ticker_with(queue: Arc<MemoryTaskQueue>) -> (Ticker, Arc<ScheduleTable>) {
        let table = Arc::new(ScheduleTable::new());
        (Ticker::new(queue, table.clone()), table)
    }

    fn install(table: &ScheduleTable, id: ConnectorId) -> u64 {
        table.install(id, Duration::from_secs(60), |_| {
            tokio::spawn(std::future::pending())
        });
        table.revision(id).unwrap()
    }

    #[tokio::test]
    async fn test_tick_enqueues_then_dedups() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let (ticker, table) = ticker_with(queue.clone());
        let id = ConnectorId::new(42);
        let revision = install(&table, id);
        let tick = ScheduledTick {
            connector_id: id,
            revision,
        };

        assert_eq!(ticker.tick(tick).await.unwrap(), TickOutcome::Enqueued);
        assert_eq!(ticker.tick(tick).await.unwrap(), TickOutcome::Duplicate);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_tick_skips_while_full_sync_queued() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let (ticker, table) = ticker_with(queue.clone());
        let id = ConnectorId::new(42);
        let revision = install(&table, id);
        submit(queue.as_ref(), &QueueMessage::new(id, TaskKind::FullSync))
            .await
            .unwrap();

        let outcome = ticker
            .tick(ScheduledTick {
                connector_id: id,
                revision,
            })
            .await
            .unwrap();
        assert_eq!(outcome, TickOutcome::FullSyncPending);
        assert!(queue.lookup(Queue::Incremental, "42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_tick_does_nothing() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let (ticker, table) = ticker_with(queue.clone());
        let id = ConnectorId::new(42);
        let revision = install(&table, id);
        table.remove(id);

        let outcome = ticker
            .tick(ScheduledTick {
                connector_id: id,
                revision,
            })
            .await
            .unwrap();
        assert_eq!(outcome, TickOutcome::Stale);
        assert!(queue.is_empty());
    }
}
