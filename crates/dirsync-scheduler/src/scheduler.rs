//! Scheduler lifecycle operations.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use dirsync_connector::model::Connector;
use dirsync_connector::store::{ConnectorChangeFeed, ConnectorStore};
use dirsync_core::{ConnectorEvent, ConnectorId};
use dirsync_queue::{purge_pending, TaskQueue};

use crate::error::{SchedulerError, SchedulerResult};
use crate::table::ScheduleTable;
use crate::tick::{ScheduledTick, Ticker};

/// Result of [`SyncScheduler::bootstrap`].
#[derive(Debug, Default)]
pub struct BootstrapReport {
    /// Connectors with a live timer after bootstrap.
    pub installed: usize,
    /// Per-connector failures; each one was skipped.
    pub failures: Vec<SchedulerError>,
}

impl BootstrapReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Keeps one incremental-sync timer per eligible connector.
pub struct SyncScheduler {
    store: Arc<dyn ConnectorStore>,
    queue: Arc<dyn TaskQueue>,
    table: Arc<ScheduleTable>,
    ticker: Ticker,
}

impl SyncScheduler {
    pub fn new(store: Arc<dyn ConnectorStore>, queue: Arc<dyn TaskQueue>) -> Self {
        let table = Arc::new(ScheduleTable::new());
        let ticker = Ticker::new(queue.clone(), table.clone());
        Self {
            store,
            queue,
            table,
            ticker,
        }
    }

    /// Install timers for every enabled connector with incremental sync on.
    ///
    /// A connector whose settings fail to parse is logged and skipped; the
    /// failure is returned in the report.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> SchedulerResult<BootstrapReport> {
        self.ensure_open()?;
        let listed = self
            .store
            .list_enabled()
            .await
            .map_err(SchedulerError::ListFailed)?;

        let mut report = BootstrapReport::default();
        for (connector_id, e) in listed.unreadable {
            warn!(connector_id = %connector_id, error = %e, "Skipping unreadable connector");
            report.failures.push(SchedulerError::connector(connector_id, e));
        }
        for connector in &listed.connectors {
            match connector.incremental_schedule() {
                Ok(Some(period)) => {
                    self.install(connector.id, period);
                    report.installed += 1;
                }
                Ok(None) => {
                    debug!(connector_id = %connector.id, "Incremental sync off, not scheduling");
                }
                Err(e) => {
                    warn!(connector_id = %connector.id, error = %e, "Skipping connector with invalid settings");
                    report
                        .failures
                        .push(SchedulerError::connector(connector.id, e));
                }
            }
        }

        info!(
            connectors = listed.connectors.len(),
            installed = report.installed,
            failed = report.failures.len(),
            "Scheduler bootstrapped"
        );
        Ok(report)
    }

    /// Schedule a new connector if it is enabled with incremental sync on.
    #[instrument(skip(self))]
    pub async fn on_connector_inserted(&self, connector_id: ConnectorId) -> SchedulerResult<()> {
        self.ensure_open()?;
        let Some(connector) = self.load(connector_id).await? else {
            debug!(connector_id = %connector_id, "Inserted connector no longer exists");
            return Ok(());
        };

        match Self::schedule_of(&connector)? {
            Some(period) => {
                self.install(connector_id, period);
            }
            None => debug!(connector_id = %connector_id, "Incremental sync off, not scheduling"),
        }
        Ok(())
    }

    /// Reconcile the connector's timer with its current settings.
    ///
    /// Unchanged periods leave the running timer alone. Settings that no
    /// longer parse remove the timer and return the parse error.
    #[instrument(skip(self))]
    pub async fn on_connector_updated(&self, connector_id: ConnectorId) -> SchedulerResult<()> {
        self.ensure_open()?;
        let Some(connector) = self.load(connector_id).await? else {
            self.unschedule(connector_id);
            return Ok(());
        };

        match Self::schedule_of(&connector) {
            Ok(Some(period)) => {
                self.install(connector_id, period);
                Ok(())
            }
            Ok(None) => {
                self.unschedule(connector_id);
                Ok(())
            }
            Err(e) => {
                self.unschedule(connector_id);
                Err(e)
            }
        }
    }

    /// Drop the connector's timer and its waiting tasks.
    #[instrument(skip(self))]
    pub async fn on_connector_deleted(&self, connector_id: ConnectorId) -> SchedulerResult<()> {
        self.ensure_open()?;
        self.unschedule(connector_id);

        for (queue, e) in purge_pending(self.queue.as_ref(), connector_id).await {
            warn!(connector_id = %connector_id, queue = %queue, error = %e, "Failed to purge queued task");
        }
        Ok(())
    }

    /// Dispatch a change-feed event.
    pub async fn apply(&self, event: ConnectorEvent) -> SchedulerResult<()> {
        match event {
            ConnectorEvent::Inserted(id) => self.on_connector_inserted(id).await,
            ConnectorEvent::Updated(id) => self.on_connector_updated(id).await,
            ConnectorEvent::Deleted(id) => self.on_connector_deleted(id).await,
        }
    }

    /// Apply events in arrival order until the feed closes or `cancel` fires.
    ///
    /// Per-event failures are logged and do not stop the loop.
    pub async fn run_change_feed<F>(
        &self,
        feed: &mut F,
        cancel: &CancellationToken,
    ) -> SchedulerResult<()>
    where
        F: ConnectorChangeFeed + ?Sized,
    {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Change feed consumer cancelled");
                    return Ok(());
                }
                next = feed.next_event() => next,
            };

            match next {
                Ok(Some(event)) => match self.apply(event).await {
                    Ok(()) => {}
                    Err(e) if e.is_shut_down() => return Ok(()),
                    Err(e) => warn!(event = %event, error = %e, "Failed to apply connector change"),
                },
                Ok(None) => {
                    info!("Change feed closed");
                    return Ok(());
                }
                Err(e) => return Err(SchedulerError::ChangeFeed(e)),
            }
        }
    }

    /// Stop every timer. Later calls are no-ops.
    pub fn shutdown(&self) {
        if let Some(stopped) = self.table.close() {
            info!(stopped, "Scheduler shut down");
        }
    }

    #[must_use]
    pub fn scheduled_period(&self, connector_id: ConnectorId) -> Option<Duration> {
        self.table.period(connector_id)
    }

    #[must_use]
    pub fn entry_revision(&self, connector_id: ConnectorId) -> Option<u64> {
        self.table.revision(connector_id)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn ensure_open(&self) -> SchedulerResult<()> {
        if self.table.is_closed() {
            return Err(SchedulerError::ShutDown);
        }
        Ok(())
    }

    async fn load(&self, connector_id: ConnectorId) -> SchedulerResult<Option<Connector>> {
        self.store
            .get(connector_id)
            .await
            .map_err(|e| SchedulerError::connector(connector_id, e))
    }

    fn schedule_of(connector: &Connector) -> SchedulerResult<Option<Duration>> {
        connector
            .incremental_schedule()
            .map_err(|e| SchedulerError::connector(connector.id, e))
    }

    fn install(&self, connector_id: ConnectorId, period: Duration) {
        let ticker = self.ticker.clone();
        let installed = self.table.install(connector_id, period, |revision| {
            tokio::spawn(ticker.run_timer(
                ScheduledTick {
                    connector_id,
                    revision,
                },
                period,
            ))
        });
        if installed {
            info!(connector_id = %connector_id, period_secs = period.as_secs(), "Incremental sync scheduled");
        }
    }

    fn unschedule(&self, connector_id: ConnectorId) {
        if self.table.remove(connector_id).is_some() {
            info!(connector_id = %connector_id, "Incremental sync unscheduled");
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.table.close();
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("entries", &self.table.len())
            .field("closed", &self.table.is_closed())
            .finish()
    }
}
