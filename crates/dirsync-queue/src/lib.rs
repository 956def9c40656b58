//! # dirsync task queue
//!
//! The broker contract shared by the scheduler (producer) and the worker
//! (consumer), plus an in-process broker used by tests and single-node runs.
//! The Postgres broker lives in `dirsync-db`.

pub mod error;
pub mod memory;
pub mod submit;
pub mod types;

use async_trait::async_trait;
use std::time::Duration;

use dirsync_core::Queue;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryTaskQueue;
pub use submit::{purge_pending, submit};
pub use types::{Delivery, EnqueueOptions, TaskHandle, TaskInfo, TaskState};

/// Durable task broker.
///
/// Task ids are unique per queue: enqueueing an id that is still stored in
/// that queue fails with [`QueueError::Duplicate`].
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Store a new pending task.
    async fn enqueue(
        &self,
        queue: Queue,
        task_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> QueueResult<TaskHandle>;

    /// State of a stored task, or [`QueueError::NotFound`].
    async fn inspect(&self, queue: Queue, task_id: &str) -> QueueResult<TaskInfo>;

    /// Mark every active task with this id as cancelled (archived).
    async fn cancel_active(&self, task_id: &str) -> QueueResult<u64>;

    /// Remove a stored task in any state, or [`QueueError::NotFound`].
    async fn delete_task(&self, queue: Queue, task_id: &str) -> QueueResult<()>;

    /// Remove the row behind `delivery`, or [`QueueError::NotFound`]. A newer
    /// task that reuses the same task id is left alone.
    async fn delete_delivery(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Claim the next pending task, highest-priority lane first.
    async fn claim(&self, lanes: &[Queue]) -> QueueResult<Option<Delivery>>;

    /// Acknowledge success. Tasks without retention are removed.
    async fn complete(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Re-pend while retries remain, otherwise archive. Returns the new state.
    async fn retry(&self, delivery: &Delivery, error: &str) -> QueueResult<TaskState>;

    /// Archive without retrying.
    async fn archive(&self, delivery: &Delivery, error: &str) -> QueueResult<()>;

    /// Extend the lease of a claimed task. Returns false when the row is no
    /// longer active under this claim.
    async fn heartbeat(&self, delivery: &Delivery) -> QueueResult<bool>;

    /// Treat claims not renewed within `lease` as failed attempts (retry
    /// while retries remain, otherwise archive) and drop expired completed
    /// tasks. Returns the number of tasks touched.
    async fn release_stale(&self, lease: Duration) -> QueueResult<u64>;

    /// [`TaskQueue::inspect`] with not-found mapped to `None`.
    async fn lookup(&self, queue: Queue, task_id: &str) -> QueueResult<Option<TaskInfo>> {
        match self.inspect(queue, task_id).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
