//! Sync worker
//!
//! Background worker that claims deliveries from the broker, executes them
//! and acknowledges each one according to its outcome. While a delivery runs
//! its claim is renewed by a heartbeat. A periodic sweep cancels local runs
//! whose broker task was cancelled, replaced or released by another process.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{interval, interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use dirsync_core::{Queue, QueueMessage};
use dirsync_queue::{Delivery, QueueResult, TaskQueue, TaskState};

use crate::error::TaskError;
use crate::executor::TaskExecutor;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of deliveries processed concurrently.
    pub concurrency: usize,

    /// How often to poll the broker (in milliseconds).
    pub poll_interval_ms: u64,

    /// How often to release expired claims (in seconds).
    pub stale_release_interval_secs: u64,

    /// Claims not renewed within this window are considered abandoned (in
    /// seconds).
    pub lease_secs: u64,

    /// How often a running delivery renews its claim (in milliseconds).
    /// Must stay well below the lease.
    pub heartbeat_interval_ms: u64,

    /// How often to look for runs cancelled elsewhere (in milliseconds).
    pub cancel_sweep_interval_ms: u64,

    /// Lanes to claim from.
    pub lanes: Vec<Queue>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval_ms: 1000,
            stale_release_interval_secs: 30,
            lease_secs: 60,
            heartbeat_interval_ms: 15_000,
            cancel_sweep_interval_ms: 2000,
            lanes: Queue::ALL.to_vec(),
        }
    }
}

/// A delivery this worker is executing.
#[derive(Debug)]
struct InFlight {
    queue: Queue,
    task_id: String,
    cancel: CancellationToken,
}

/// State shared with spawned delivery tasks.
struct Shared {
    queue: Arc<dyn TaskQueue>,
    executor: Arc<TaskExecutor>,
    heartbeat_interval: Duration,
    /// Keyed by delivery row id.
    in_flight: Mutex<HashMap<i64, InFlight>>,
}

/// Worker that drains the sync lanes.
pub struct SyncWorker {
    shared: Arc<Shared>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl SyncWorker {
    pub fn new(queue: Arc<dyn TaskQueue>, executor: Arc<TaskExecutor>, config: WorkerConfig) -> Self {
        let shared = Shared {
            queue,
            executor,
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms.max(1)),
            in_flight: Mutex::new(HashMap::new()),
        };
        Self {
            shared: Arc::new(shared),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the worker. Returns after shutdown once in-flight deliveries
    /// have finished.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            lease_secs = self.config.lease_secs,
            "Starting sync worker"
        );

        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut poll_interval = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        let mut stale_interval =
            interval(Duration::from_secs(self.config.stale_release_interval_secs.max(1)));
        let mut sweep_interval =
            interval(Duration::from_millis(self.config.cancel_sweep_interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if self.is_shutdown() {
                        info!("Worker shutdown requested, stopping poll loop");
                        break;
                    }
                    self.poll_and_process(&semaphore).await;
                }
                _ = stale_interval.tick() => {
                    self.release_stale().await;
                }
                _ = sweep_interval.tick() => {
                    self.sweep_cancelled().await;
                }
            }
        }

        info!("Waiting for in-flight deliveries to complete...");
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        let _ = semaphore.acquire_many(permits).await;
        info!("Worker stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Claim and process one delivery inline. Returns false when the lanes
    /// are empty.
    pub async fn process_next(&self) -> QueueResult<bool> {
        match self.shared.queue.claim(&self.config.lanes).await? {
            Some(delivery) => {
                process_delivery(self.shared.clone(), delivery).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Claim deliveries while worker slots are free.
    async fn poll_and_process(&self, semaphore: &Arc<Semaphore>) {
        loop {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                debug!("All worker slots busy");
                return;
            };

            let delivery = match self.shared.queue.claim(&self.config.lanes).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "Failed to claim delivery");
                    return;
                }
            };

            let shared = self.shared.clone();
            tokio::spawn(async move {
                let _permit = permit;
                process_delivery(shared, delivery).await;
            });
        }
    }

    async fn release_stale(&self) {
        match self
            .shared
            .queue
            .release_stale(Duration::from_secs(self.config.lease_secs))
            .await
        {
            Ok(count) if count > 0 => warn!(count, "Released stale tasks"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Failed to release stale tasks"),
        }
    }

    /// Cancel in-flight sync deliveries whose broker row is no longer this
    /// worker's active claim: archived by a `terminate` handled elsewhere,
    /// deleted, replaced by a newer task or released after a lost lease.
    /// Returns the number of runs cancelled.
    pub async fn sweep_cancelled(&self) -> usize {
        let watched: Vec<(i64, Queue, String, CancellationToken)> = self
            .shared
            .in_flight
            .lock()
            .iter()
            .filter(|(_, run)| Queue::SYNC_LANES.contains(&run.queue) && !run.cancel.is_cancelled())
            .map(|(id, run)| (*id, run.queue, run.task_id.clone(), run.cancel.clone()))
            .collect();

        let mut cancelled = 0;
        for (id, queue, task_id, cancel) in watched {
            let still_claimed = match self.shared.queue.lookup(queue, &task_id).await {
                Ok(Some(info)) => info.id == id && info.state == TaskState::Active,
                Ok(None) => false,
                Err(e) => {
                    debug!(task_id = %task_id, error = %e, "Failed to check running task");
                    continue;
                }
            };
            if !still_claimed {
                info!(lane = %queue, task_id = %task_id, "Cancelling run whose task was terminated elsewhere");
                cancel.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}

/// Renew the delivery's claim every `every` until aborted or the claim is
/// gone.
async fn keep_alive(queue: Arc<dyn TaskQueue>, delivery: Delivery, every: Duration) {
    let mut ticker = interval_at(Instant::now() + every, every);
    loop {
        ticker.tick().await;
        match queue.heartbeat(&delivery).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(task_id = %delivery.task_id, "Claim no longer active, stopping heartbeat");
                return;
            }
            Err(e) => warn!(task_id = %delivery.task_id, error = %e, "Failed to renew claim"),
        }
    }
}

/// Execute one delivery and acknowledge it.
///
/// Success, conflicts and cancellations complete the task. Retryable errors
/// go back to the broker's retry policy; everything else is archived. When
/// the acknowledgement itself fails the delivery's row is deleted so its id
/// is free. A newer task reusing the id is never touched.
#[instrument(skip(shared, delivery), fields(lane = %delivery.queue, task_id = %delivery.task_id))]
async fn process_delivery(shared: Arc<Shared>, delivery: Delivery) {
    let start = std::time::Instant::now();
    let cancel = CancellationToken::new();
    shared.in_flight.lock().insert(
        delivery.id,
        InFlight {
            queue: delivery.queue,
            task_id: delivery.task_id.clone(),
            cancel: cancel.clone(),
        },
    );
    let heartbeat = tokio::spawn(keep_alive(
        shared.queue.clone(),
        delivery.clone(),
        shared.heartbeat_interval,
    ));

    let result = match QueueMessage::from_json(&delivery.payload) {
        Ok(message) => shared.executor.execute_under(&message, &cancel).await,
        Err(e) => Err(TaskError::from(e)),
    };

    heartbeat.abort();
    shared.in_flight.lock().remove(&delivery.id);
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let queue = &shared.queue;
    let ack = match &result {
        Ok(outcome) => {
            info!(duration_ms, outcome = ?outcome, "Task completed");
            queue.complete(&delivery).await
        }
        Err(e) if e.is_conflict() => {
            info!(error = %e, "Task rejected by running task");
            queue.complete(&delivery).await
        }
        Err(e) if e.is_cancelled() => {
            info!(duration_ms, "Task cancelled");
            queue.complete(&delivery).await
        }
        Err(e) if e.is_retryable() => {
            warn!(duration_ms, error = %e, retried = delivery.retried, "Task failed");
            queue
                .retry(&delivery, &e.to_string())
                .await
                .map(|state| debug!(state = %state, "Task returned to broker"))
        }
        Err(e) => {
            error!(error = %e, "Task failed permanently");
            queue.archive(&delivery, &e.to_string()).await
        }
    };

    if let Err(e) = ack {
        warn!(error = %e, "Failed to acknowledge task, deleting it");
        match queue.delete_delivery(&delivery).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => error!(error = %e, "Failed to delete task"),
        }
    }
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("config", &self.config)
            .field("in_flight", &self.shared.in_flight.lock().len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
