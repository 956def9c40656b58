//! Executes one task message under admission control.

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use dirsync_connector::error::ConnectorError;
use dirsync_connector::model::Connector;
use dirsync_connector::store::ConnectorStore;
use dirsync_connector::sync::{SyncMode, SyncRunner};
use dirsync_core::{ConnectorId, QueueMessage, TaskKind};
use dirsync_queue::{purge_pending, TaskQueue};

use crate::admission::{Admission, AdmissionTable, RunTicket};
use crate::error::{TaskError, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A sync run completed and the watermark was written.
    Synced {
        records: u64,
        /// Kind of the run this one cancelled, if any.
        preempted: Option<TaskKind>,
    },
    /// A terminate task cancelled the running task, if any, and purged
    /// waiting sync tasks.
    Terminated { cancelled: Option<TaskKind> },
}

/// Runs sync and terminate tasks, one at a time per connector.
pub struct TaskExecutor {
    admissions: AdmissionTable,
    store: Arc<dyn ConnectorStore>,
    runner: Arc<dyn SyncRunner>,
    queue: Arc<dyn TaskQueue>,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<dyn ConnectorStore>,
        runner: Arc<dyn SyncRunner>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            admissions: AdmissionTable::new(),
            store,
            runner,
            queue,
        }
    }

    #[must_use]
    pub fn admissions(&self) -> &AdmissionTable {
        &self.admissions
    }

    pub async fn execute(&self, message: &QueueMessage) -> TaskResult<TaskOutcome> {
        self.execute_under(message, &CancellationToken::new()).await
    }

    /// Execute `message`; cancelling `cancel` cancels the admitted run.
    #[instrument(skip(self, message, cancel), fields(connector_id = %message.connector_id(), kind = %message.task_type()))]
    pub async fn execute_under(
        &self,
        message: &QueueMessage,
        cancel: &CancellationToken,
    ) -> TaskResult<TaskOutcome> {
        let connector_id = message.connector_id();
        match message.task_type() {
            TaskKind::Terminate => self.terminate(connector_id).await,
            kind => self.sync(connector_id, kind, cancel).await,
        }
    }

    async fn sync(
        &self,
        connector_id: ConnectorId,
        kind: TaskKind,
        cancel: &CancellationToken,
    ) -> TaskResult<TaskOutcome> {
        let connector = self.load_for_sync(connector_id, kind).await?;
        let mode = SyncMode::for_task(kind, connector.last_sync)
            .ok_or_else(|| TaskError::configuration(format!("{kind} does not run a sync")))?;

        let (ticket, preempted) = self.admit(connector_id, kind, cancel)?;

        // Watermark is the run's start, not its end.
        let started_at = Utc::now();
        info!(mode = %mode, "Starting sync");
        let records = self
            .runner
            .run(ticket.token(), &connector, mode)
            .await
            .map_err(TaskError::from)?;
        if ticket.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        self.store
            .record_sync(connector_id, started_at)
            .await
            .map_err(TaskError::from)?;

        info!(records, "Sync completed");
        Ok(TaskOutcome::Synced { records, preempted })
    }

    /// Cancel the local run, mark runs owned by other workers cancelled in
    /// the broker and drop waiting sync tasks. Broker failures are logged;
    /// a terminate always succeeds.
    async fn terminate(&self, connector_id: ConnectorId) -> TaskResult<TaskOutcome> {
        let (_ticket, cancelled) =
            self.admit(connector_id, TaskKind::Terminate, &CancellationToken::new())?;
        if let Some(kind) = cancelled {
            info!(cancelled = %kind, "Cancelled running task");
        }

        // Runs owned by other workers see the archived row in their sweep.
        match self.queue.cancel_active(&connector_id.to_string()).await {
            Ok(0) => {}
            Ok(count) => info!(count, "Marked active tasks cancelled"),
            Err(e) => warn!(error = %e, "Failed to cancel active tasks"),
        }

        for (queue, e) in purge_pending(self.queue.as_ref(), connector_id).await {
            warn!(queue = %queue, error = %e, "Failed to purge queued task");
        }

        Ok(TaskOutcome::Terminated { cancelled })
    }

    /// Re-read the connector and check it may still sync with `kind`.
    async fn load_for_sync(&self, connector_id: ConnectorId, kind: TaskKind) -> TaskResult<Connector> {
        let connector = self
            .store
            .get(connector_id)
            .await?
            .ok_or(ConnectorError::ConnectorNotFound { connector_id })?;

        if !connector.enabled {
            return Err(ConnectorError::ConnectorDisabled { connector_id }.into());
        }
        if kind == TaskKind::IncrementalSync && connector.incremental_schedule()?.is_none() {
            return Err(TaskError::configuration(format!(
                "incremental sync is disabled for connector {connector_id}"
            )));
        }
        Ok(connector)
    }

    fn admit(
        &self,
        connector_id: ConnectorId,
        kind: TaskKind,
        cancel: &CancellationToken,
    ) -> TaskResult<(RunTicket, Option<TaskKind>)> {
        match self.admissions.admit_under(connector_id, kind, cancel) {
            Admission::Proceed(ticket) => Ok((ticket, None)),
            Admission::Preempted { ticket, displaced } => Ok((ticket, Some(displaced))),
            Admission::Rejected { active } => Err(TaskError::Conflict {
                connector_id,
                active,
                requested: kind,
            }),
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("running", &self.admissions.len())
            .finish()
    }
}
