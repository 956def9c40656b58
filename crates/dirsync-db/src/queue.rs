//! Postgres-backed task broker.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use dirsync_core::Queue;
use dirsync_queue::{
    Delivery, EnqueueOptions, QueueError, QueueResult, TaskHandle, TaskInfo, TaskQueue, TaskState,
};

use crate::error::DbError;
use crate::models::{NewTask, TaskRow};
use crate::pool::DbPool;

/// [`TaskQueue`] over the `task_queue` table.
#[derive(Debug, Clone)]
pub struct PgTaskQueue {
    pool: DbPool,
}

impl PgTaskQueue {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> QueueError {
    DbError::QueryFailed(e).into()
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(
        &self,
        queue: Queue,
        task_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> QueueResult<TaskHandle> {
        let task = NewTask {
            queue,
            task_id: &options.task_id,
            task_type,
            payload: &payload,
            max_retry: i32::try_from(options.max_retry).unwrap_or(i32::MAX),
            retention_secs: i64::try_from(options.retention.as_secs()).unwrap_or(i64::MAX),
        };

        match TaskRow::insert(self.pool.inner(), &task)
            .await
            .map_err(query_failed)?
        {
            Some(id) => {
                debug!(queue = %queue, task_id = %options.task_id, row_id = id, "Task enqueued");
                Ok(TaskHandle {
                    queue,
                    task_id: options.task_id,
                })
            }
            None => Err(QueueError::Duplicate {
                queue,
                task_id: options.task_id,
            }),
        }
    }

    async fn inspect(&self, queue: Queue, task_id: &str) -> QueueResult<TaskInfo> {
        TaskRow::find(self.pool.inner(), queue, task_id)
            .await
            .map_err(query_failed)?
            .ok_or_else(|| QueueError::not_found(queue, task_id))?
            .into_info()
    }

    async fn cancel_active(&self, task_id: &str) -> QueueResult<u64> {
        TaskRow::cancel_active(self.pool.inner(), task_id)
            .await
            .map_err(query_failed)
    }

    async fn delete_task(&self, queue: Queue, task_id: &str) -> QueueResult<()> {
        if TaskRow::delete(self.pool.inner(), queue, task_id)
            .await
            .map_err(query_failed)?
        {
            Ok(())
        } else {
            Err(QueueError::not_found(queue, task_id))
        }
    }

    async fn delete_delivery(&self, delivery: &Delivery) -> QueueResult<()> {
        if TaskRow::delete_by_id(self.pool.inner(), delivery.id)
            .await
            .map_err(query_failed)?
        {
            Ok(())
        } else {
            Err(QueueError::not_found(delivery.queue, &delivery.task_id))
        }
    }

    async fn claim(&self, lanes: &[Queue]) -> QueueResult<Option<Delivery>> {
        if lanes.is_empty() {
            return Ok(None);
        }
        TaskRow::claim(self.pool.inner(), lanes)
            .await
            .map_err(query_failed)?
            .map(TaskRow::into_delivery)
            .transpose()
    }

    async fn complete(&self, delivery: &Delivery) -> QueueResult<()> {
        if TaskRow::complete(self.pool.inner(), delivery.id)
            .await
            .map_err(query_failed)?
        {
            Ok(())
        } else {
            Err(QueueError::not_found(delivery.queue, &delivery.task_id))
        }
    }

    async fn retry(&self, delivery: &Delivery, error: &str) -> QueueResult<TaskState> {
        let state = TaskRow::retry(self.pool.inner(), delivery.id, error)
            .await
            .map_err(query_failed)?
            .ok_or_else(|| QueueError::not_found(delivery.queue, &delivery.task_id))?;
        state.parse().map_err(QueueError::backend)
    }

    async fn archive(&self, delivery: &Delivery, error: &str) -> QueueResult<()> {
        if TaskRow::archive(self.pool.inner(), delivery.id, error)
            .await
            .map_err(query_failed)?
        {
            Ok(())
        } else {
            Err(QueueError::not_found(delivery.queue, &delivery.task_id))
        }
    }

    async fn heartbeat(&self, delivery: &Delivery) -> QueueResult<bool> {
        TaskRow::heartbeat(self.pool.inner(), delivery.id)
            .await
            .map_err(query_failed)
    }

    async fn release_stale(&self, lease: Duration) -> QueueResult<u64> {
        let released = TaskRow::release_expired_claims(self.pool.inner(), lease.as_secs_f64())
            .await
            .map_err(query_failed)?;
        let purged = TaskRow::purge_expired(self.pool.inner())
            .await
            .map_err(query_failed)?;
        Ok(released + purged)
    }
}
