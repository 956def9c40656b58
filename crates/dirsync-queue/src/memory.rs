//! In-process broker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

use dirsync_core::Queue;

use crate::error::{QueueError, QueueResult};
use crate::types::{Delivery, EnqueueOptions, TaskHandle, TaskInfo, TaskState};
use crate::TaskQueue;

#[derive(Debug, Clone)]
struct StoredTask {
    id: i64,
    queue: Queue,
    task_id: String,
    task_type: String,
    payload: Vec<u8>,
    state: TaskState,
    retried: u32,
    max_retry: u32,
    retention: Duration,
    last_error: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl StoredTask {
    fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            queue: self.queue,
            task_id: self.task_id.clone(),
            task_type: self.task_type.clone(),
            state: self.state,
            retried: self.retried,
            max_retry: self.max_retry,
            last_error: self.last_error.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Tasks {
    next_id: i64,
    rows: Vec<StoredTask>,
}

/// Broker holding tasks in memory. Ordering and dedup rules match the
/// Postgres broker.
#[derive(Debug, Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<Tasks>,
}

impl MemoryTaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored task.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.tasks.lock().rows.iter().map(StoredTask::info).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(
        &self,
        queue: Queue,
        task_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> QueueResult<TaskHandle> {
        let mut tasks = self.tasks.lock();
        if tasks
            .rows
            .iter()
            .any(|t| t.queue == queue && t.task_id == options.task_id)
        {
            return Err(QueueError::Duplicate {
                queue,
                task_id: options.task_id,
            });
        }

        tasks.next_id += 1;
        let id = tasks.next_id;
        tasks.rows.push(StoredTask {
            id,
            queue,
            task_id: options.task_id.clone(),
            task_type: task_type.to_string(),
            payload,
            state: TaskState::Pending,
            retried: 0,
            max_retry: options.max_retry,
            retention: options.retention,
            last_error: None,
            claimed_at: None,
            completed_at: None,
        });

        Ok(TaskHandle {
            queue,
            task_id: options.task_id,
        })
    }

    async fn inspect(&self, queue: Queue, task_id: &str) -> QueueResult<TaskInfo> {
        self.tasks
            .lock()
            .rows
            .iter()
            .find(|t| t.queue == queue && t.task_id == task_id)
            .map(StoredTask::info)
            .ok_or_else(|| QueueError::not_found(queue, task_id))
    }

    async fn cancel_active(&self, task_id: &str) -> QueueResult<u64> {
        let mut tasks = self.tasks.lock();
        let mut cancelled = 0;
        for task in tasks
            .rows
            .iter_mut()
            .filter(|t| t.task_id == task_id && t.state == TaskState::Active)
        {
            task.state = TaskState::Archived;
            task.last_error = Some("cancelled".to_string());
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn delete_task(&self, queue: Queue, task_id: &str) -> QueueResult<()> {
        let mut tasks = self.tasks.lock();
        let before = tasks.rows.len();
        tasks
            .rows
            .retain(|t| !(t.queue == queue && t.task_id == task_id));
        if tasks.rows.len() == before {
            return Err(QueueError::not_found(queue, task_id));
        }
        Ok(())
    }

    async fn delete_delivery(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut tasks = self.tasks.lock();
        let Some(index) = tasks.rows.iter().position(|t| t.id == delivery.id) else {
            return Err(QueueError::not_found(delivery.queue, &delivery.task_id));
        };
        tasks.rows.remove(index);
        Ok(())
    }

    async fn claim(&self, lanes: &[Queue]) -> QueueResult<Option<Delivery>> {
        let mut tasks = self.tasks.lock();
        let next = tasks
            .rows
            .iter_mut()
            .filter(|t| t.state.is_waiting() && lanes.contains(&t.queue))
            .min_by_key(|t| (std::cmp::Reverse(t.queue.priority()), t.id));

        Ok(next.map(|task| {
            let now = Utc::now();
            task.state = TaskState::Active;
            task.claimed_at = Some(now);
            Delivery {
                id: task.id,
                queue: task.queue,
                task_id: task.task_id.clone(),
                task_type: task.task_type.clone(),
                payload: task.payload.clone(),
                retried: task.retried,
                max_retry: task.max_retry,
                claimed_at: now,
            }
        }))
    }

    async fn complete(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut tasks = self.tasks.lock();
        let Some(index) = tasks.rows.iter().position(|t| t.id == delivery.id) else {
            return Err(QueueError::not_found(delivery.queue, &delivery.task_id));
        };
        if tasks.rows[index].retention.is_zero() {
            tasks.rows.remove(index);
        } else {
            let task = &mut tasks.rows[index];
            task.state = TaskState::Completed;
            task.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, error: &str) -> QueueResult<TaskState> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .rows
            .iter_mut()
            .find(|t| t.id == delivery.id)
            .ok_or_else(|| QueueError::not_found(delivery.queue, &delivery.task_id))?;

        task.last_error = Some(error.to_string());
        if task.retried < task.max_retry {
            task.retried += 1;
            task.state = TaskState::Retry;
        } else {
            task.state = TaskState::Archived;
        }
        Ok(task.state)
    }

    async fn archive(&self, delivery: &Delivery, error: &str) -> QueueResult<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .rows
            .iter_mut()
            .find(|t| t.id == delivery.id)
            .ok_or_else(|| QueueError::not_found(delivery.queue, &delivery.task_id))?;
        task.state = TaskState::Archived;
        task.last_error = Some(error.to_string());
        Ok(())
    }

    async fn heartbeat(&self, delivery: &Delivery) -> QueueResult<bool> {
        let mut tasks = self.tasks.lock();
        match tasks
            .rows
            .iter_mut()
            .find(|t| t.id == delivery.id && t.state == TaskState::Active)
        {
            Some(task) => {
                task.claimed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release_stale(&self, lease: Duration) -> QueueResult<u64> {
        let now = Utc::now();
        let mut tasks = self.tasks.lock();
        let mut touched = 0;

        let before = tasks.rows.len();
        tasks.rows.retain(|t| match (t.state, t.completed_at) {
            (TaskState::Completed, Some(done)) => elapsed(done, now) < t.retention,
            _ => true,
        });
        touched += (before - tasks.rows.len()) as u64;

        for task in tasks.rows.iter_mut().filter(|t| t.state == TaskState::Active) {
            if task.claimed_at.is_some_and(|at| elapsed(at, now) >= lease) {
                task.last_error = Some("lease expired".to_string());
                task.claimed_at = None;
                if task.retried < task.max_retry {
                    task.retried += 1;
                    task.state = TaskState::Retry;
                } else {
                    task.state = TaskState::Archived;
                }
                touched += 1;
            }
        }
        Ok(touched)
    }
}
