//! Task queue model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use dirsync_core::Queue;
use dirsync_queue::{Delivery, QueueError, TaskInfo, TaskState};

/// Row of the `task_queue` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub queue: String,
    pub task_id: String,
    pub task_type: String,
    pub payload: Vec<u8>,
    pub state: String,
    pub priority: i32,
    pub retried: i32,
    pub max_retry: i32,
    pub retention_secs: i64,
    pub last_error: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert parameters.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub queue: Queue,
    pub task_id: &'a str,
    pub task_type: &'a str,
    pub payload: &'a [u8],
    pub max_retry: i32,
    pub retention_secs: i64,
}

impl TaskRow {
    /// Insert a pending task. `None` when the id is already taken in the queue.
    pub async fn insert(pool: &sqlx::PgPool, task: &NewTask<'_>) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r"
            INSERT INTO task_queue (queue, task_id, task_type, payload, priority, max_retry, retention_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (queue, task_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(task.queue.as_str())
        .bind(task.task_id)
        .bind(task.task_type)
        .bind(task.payload)
        .bind(i32::from(task.queue.priority()))
        .bind(task.max_retry)
        .bind(task.retention_secs)
        .fetch_optional(pool)
        .await
    }

    pub async fn find(
        pool: &sqlx::PgPool,
        queue: Queue,
        task_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM task_queue
            WHERE queue = $1 AND task_id = $2
            ",
        )
        .bind(queue.as_str())
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &sqlx::PgPool, queue: Queue, task_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_queue WHERE queue = $1 AND task_id = $2")
            .bind(queue.as_str())
            .bind(task_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_id(pool: &sqlx::PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_queue WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Archive every active task with this id, across queues.
    pub async fn cancel_active(pool: &sqlx::PgPool, task_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE task_queue
            SET state = 'archived', last_error = 'cancelled', claimed_at = NULL
            WHERE task_id = $1 AND state = 'active'
            ",
        )
        .bind(task_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Claim the next waiting task in `lanes`, highest priority first.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same row.
    pub async fn claim(pool: &sqlx::PgPool, lanes: &[Queue]) -> Result<Option<Self>, sqlx::Error> {
        let lanes: Vec<String> = lanes.iter().map(|q| q.as_str().to_string()).collect();
        sqlx::query_as(
            r"
            UPDATE task_queue
            SET state = 'active', claimed_at = NOW()
            WHERE id = (
                SELECT id FROM task_queue
                WHERE state IN ('pending', 'retry') AND queue = ANY($1)
                ORDER BY priority DESC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            ",
        )
        .bind(lanes)
        .fetch_optional(pool)
        .await
    }

    /// Remove the row when it has no retention, otherwise mark it completed.
    pub async fn complete(pool: &sqlx::PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let deleted = sqlx::query("DELETE FROM task_queue WHERE id = $1 AND retention_secs = 0")
            .bind(id)
            .execute(pool)
            .await?;
        if deleted.rows_affected() > 0 {
            return Ok(true);
        }

        let updated = sqlx::query(
            r"
            UPDATE task_queue
            SET state = 'completed', completed_at = NOW(), claimed_at = NULL, last_error = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    /// Re-pend while retries remain, otherwise archive. Returns the new state.
    pub async fn retry(
        pool: &sqlx::PgPool,
        id: i64,
        error: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r"
            UPDATE task_queue
            SET state = CASE WHEN retried < max_retry THEN 'retry' ELSE 'archived' END,
                retried = CASE WHEN retried < max_retry THEN retried + 1 ELSE retried END,
                last_error = $2,
                claimed_at = NULL
            WHERE id = $1
            RETURNING state
            ",
        )
        .bind(id)
        .bind(error)
        .fetch_optional(pool)
        .await
    }

    pub async fn archive(pool: &sqlx::PgPool, id: i64, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE task_queue
            SET state = 'archived', last_error = $2, claimed_at = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Renew the claim of an active row. False when the row is gone or no
    /// longer active.
    pub async fn heartbeat(pool: &sqlx::PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE task_queue
            SET claimed_at = NOW()
            WHERE id = $1 AND state = 'active'
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fail claims not renewed within `lease_secs`: retry while retries
    /// remain, otherwise archive.
    pub async fn release_expired_claims(
        pool: &sqlx::PgPool,
        lease_secs: f64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE task_queue
            SET state = CASE WHEN retried < max_retry THEN 'retry' ELSE 'archived' END,
                retried = CASE WHEN retried < max_retry THEN retried + 1 ELSE retried END,
                last_error = 'lease expired',
                claimed_at = NULL
            WHERE state = 'active'
                AND claimed_at <= NOW() - make_interval(secs => $1)
            ",
        )
        .bind(lease_secs)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Drop completed rows past their retention.
    pub async fn purge_expired(pool: &sqlx::PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM task_queue
            WHERE state = 'completed'
                AND completed_at + make_interval(secs => retention_secs) < NOW()
            ",
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub fn queue(&self) -> Result<Queue, QueueError> {
        self.queue
            .parse()
            .map_err(|e: dirsync_core::ParseError| QueueError::backend(e.to_string()))
    }

    pub fn state(&self) -> Result<TaskState, QueueError> {
        self.state.parse().map_err(QueueError::backend)
    }

    pub fn into_info(self) -> Result<TaskInfo, QueueError> {
        Ok(TaskInfo {
            id: self.id,
            queue: self.queue()?,
            state: self.state()?,
            retried: to_u32(self.retried),
            max_retry: to_u32(self.max_retry),
            task_id: self.task_id,
            task_type: self.task_type,
            last_error: self.last_error,
        })
    }

    pub fn into_delivery(self) -> Result<Delivery, QueueError> {
        Ok(Delivery {
            id: self.id,
            queue: self.queue()?,
            retried: to_u32(self.retried),
            max_retry: to_u32(self.max_retry),
            claimed_at: self.claimed_at.unwrap_or_else(Utc::now),
            task_id: self.task_id,
            task_type: self.task_type,
            payload: self.payload,
        })
    }
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
