//! RunningTask table and admission decisions.
//!
//! The preempt/reject decision and the map update happen in the same
//! critical section, so there is at most one running task per connector.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dirsync_core::{ConnectorId, TaskKind};

#[derive(Debug)]
struct RunningTask {
    kind: TaskKind,
    cancel: CancellationToken,
    run_id: u64,
}

#[derive(Debug, Default)]
struct Inner {
    running: Mutex<HashMap<ConnectorId, RunningTask>>,
    next_run_id: AtomicU64,
}

impl Inner {
    /// Remove the entry only if it still belongs to `run_id`.
    fn finish(&self, connector_id: ConnectorId, run_id: u64) -> bool {
        let mut running = self.running.lock();
        if running
            .get(&connector_id)
            .is_some_and(|task| task.run_id == run_id)
        {
            running.remove(&connector_id);
            true
        } else {
            false
        }
    }
}

/// Outcome of [`AdmissionTable::admit`].
#[derive(Debug)]
pub enum Admission {
    /// Nothing was running for the connector.
    Proceed(RunTicket),
    /// A task of kind `displaced` was cancelled and replaced.
    Preempted {
        ticket: RunTicket,
        displaced: TaskKind,
    },
    /// A higher-priority task of kind `active` is running.
    Rejected { active: TaskKind },
}

/// Connector-keyed RunningTask table. Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct AdmissionTable {
    inner: Arc<Inner>,
}

impl AdmissionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a task of `kind` for the connector.
    ///
    /// Rejects when the running task outranks `kind`. Otherwise cancels and
    /// replaces the running task, if any.
    pub fn admit(&self, connector_id: ConnectorId, kind: TaskKind) -> Admission {
        self.admit_under(connector_id, kind, &CancellationToken::new())
    }

    /// [`AdmissionTable::admit`] with the run's token derived from `parent`,
    /// so cancelling `parent` also cancels the run.
    pub fn admit_under(
        &self,
        connector_id: ConnectorId,
        kind: TaskKind,
        parent: &CancellationToken,
    ) -> Admission {
        let mut running = self.inner.running.lock();

        if let Some(active) = running.get(&connector_id) {
            if active.kind.outranks(kind) {
                return Admission::Rejected {
                    active: active.kind,
                };
            }
        }

        let run_id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = parent.child_token();
        let displaced = running.insert(
            connector_id,
            RunningTask {
                kind,
                cancel: cancel.clone(),
                run_id,
            },
        );
        if let Some(old) = &displaced {
            old.cancel.cancel();
        }
        drop(running);

        let ticket = RunTicket {
            connector_id,
            kind,
            run_id,
            cancel,
            table: self.inner.clone(),
        };
        match displaced {
            Some(old) => {
                debug!(connector_id = %connector_id, displaced = %old.kind, incoming = %kind, "Preempted running task");
                Admission::Preempted {
                    ticket,
                    displaced: old.kind,
                }
            }
            None => Admission::Proceed(ticket),
        }
    }

    /// Cancel and remove the connector's running task, if any.
    pub fn cancel(&self, connector_id: ConnectorId) -> Option<TaskKind> {
        let removed = self.inner.running.lock().remove(&connector_id);
        removed.map(|task| {
            task.cancel.cancel();
            task.kind
        })
    }

    #[must_use]
    pub fn running_kind(&self, connector_id: ConnectorId) -> Option<TaskKind> {
        self.inner
            .running
            .lock()
            .get(&connector_id)
            .map(|task| task.kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.running.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Admission of one run. Dropping it removes the RunningTask entry unless
/// another run has replaced it.
#[derive(Debug)]
pub struct RunTicket {
    connector_id: ConnectorId,
    kind: TaskKind,
    run_id: u64,
    cancel: CancellationToken,
    table: Arc<Inner>,
}

impl RunTicket {
    #[must_use]
    pub fn connector_id(&self) -> ConnectorId {
        self.connector_id
    }

    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    #[must_use]
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        if self.table.finish(self.connector_id, self.run_id) {
            debug!(connector_id = %self.connector_id, kind = %self.kind, "Run finished");
        }
    }
}
