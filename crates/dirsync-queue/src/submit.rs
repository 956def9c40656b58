//! Producer-side helpers shared by the scheduler, the worker and the CLI.

use tracing::debug;

use dirsync_core::{ConnectorId, Queue, QueueMessage};

use crate::error::{QueueError, QueueResult};
use crate::types::{EnqueueOptions, TaskHandle};
use crate::TaskQueue;

/// Enqueue `message` fire-and-forget with the connector id as task id.
///
/// A finished (archived or completed) task still holding the id is deleted
/// first. A waiting or active one makes this fail with
/// [`QueueError::Duplicate`].
pub async fn submit(queue: &dyn TaskQueue, message: &QueueMessage) -> QueueResult<TaskHandle> {
    let lane = message.queue();
    let task_id = message.dedup_id();

    if let Some(existing) = queue.lookup(lane, &task_id).await? {
        if !existing.state.is_finished() {
            return Err(QueueError::Duplicate {
                queue: lane,
                task_id,
            });
        }
        debug!(queue = %lane, task_id = %task_id, state = %existing.state, "Deleting finished task before enqueue");
        match queue.delete_task(lane, &task_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }

    let payload = message
        .to_json()
        .map_err(|e| QueueError::Payload(e.to_string()))?;
    queue
        .enqueue(
            lane,
            message.task_type().as_str(),
            payload,
            EnqueueOptions::fire_and_forget(task_id),
        )
        .await
}

/// Delete a connector's waiting (pending or retry) tasks from the sync lanes.
///
/// Active and finished rows stay: an archived row may be the cancellation
/// marker a worker on another process is polling for.
///
/// Not-found is ignored. Other failures are returned per lane so the caller
/// can log them without aborting.
pub async fn purge_pending(
    queue: &dyn TaskQueue,
    connector_id: ConnectorId,
) -> Vec<(Queue, QueueError)> {
    let task_id = connector_id.to_string();
    let mut failures = Vec::new();

    for lane in Queue::SYNC_LANES {
        match queue.lookup(lane, &task_id).await {
            Ok(Some(info)) if info.state.is_waiting() => {
                match queue.delete_task(lane, &task_id).await {
                    Ok(()) => {
                        debug!(queue = %lane, connector_id = %connector_id, state = %info.state, "Purged queued task");
                    }
                    Err(e) if e.is_not_found() => {}
                    Err(e) => failures.push((lane, e)),
                }
            }
            Ok(_) => {}
            Err(e) => failures.push((lane, e)),
        }
    }

    failures
}
