//! Admission and execution of sync and terminate tasks.

mod common;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use dirsync_connector::error::ConnectorError;
use dirsync_core::{ConnectorId, QueueMessage, TaskKind};
use dirsync_queue::{submit, TaskQueue};
use dirsync_worker::{Admission, AdmissionTable, TaskError, TaskExecutor, TaskOutcome};

use common::{fixture, ldap_connector, Behavior, UnreachableQueue, ID};

#[tokio::test]
async fn test_full_sync_records_watermark() {
    let f = fixture(Behavior::Succeed(7), Behavior::Succeed(0));

    let outcome = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::FullSync))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TaskOutcome::Synced {
            records: 7,
            preempted: None
        }
    );
    assert!(f.store.last_sync(ID).is_some());
    assert!(f.executor.admissions().is_empty());
}

#[tokio::test]
async fn test_watermark_is_taken_at_run_start() {
    let f = fixture(Behavior::Block, Behavior::Succeed(0));
    let before = Utc::now();

    let executor = f.executor.clone();
    let full = tokio::spawn(async move {
        executor
            .execute(&QueueMessage::new(ID, TaskKind::FullSync))
            .await
    });
    f.runner.started.notified().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mid_run = Utc::now();

    f.runner.release.notify_one();
    full.await.unwrap().unwrap();

    let watermark = f.store.last_sync(ID).unwrap();
    assert!(watermark >= before);
    assert!(watermark < mid_run);
}

#[tokio::test]
async fn test_full_sync_preempts_running_incremental() {
    let f = fixture(Behavior::Succeed(3), Behavior::Block);

    let executor = f.executor.clone();
    let incremental = tokio::spawn(async move {
        executor
            .execute(&QueueMessage::new(ID, TaskKind::IncrementalSync))
            .await
    });
    f.runner.started.notified().await;
    assert_eq!(
        f.executor.admissions().running_kind(ID),
        Some(TaskKind::IncrementalSync)
    );

    let outcome = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::FullSync))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TaskOutcome::Synced {
            records: 3,
            preempted: Some(TaskKind::IncrementalSync)
        }
    );

    let result = incremental.await.unwrap();
    assert!(matches!(result, Err(TaskError::Cancelled)));
    assert_eq!(f.runner.cancelled(), 1);
    assert!(f.executor.admissions().is_empty());
}

#[tokio::test]
async fn test_incremental_rejected_while_full_sync_runs() {
    let f = fixture(Behavior::Block, Behavior::Succeed(1));

    let executor = f.executor.clone();
    let full = tokio::spawn(async move {
        executor
            .execute(&QueueMessage::new(ID, TaskKind::FullSync))
            .await
    });
    f.runner.started.notified().await;

    let err = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::IncrementalSync))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskError::Conflict {
            active: TaskKind::FullSync,
            requested: TaskKind::IncrementalSync,
            ..
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(
        f.executor.admissions().running_kind(ID),
        Some(TaskKind::FullSync)
    );
    assert_eq!(f.runner.calls(), 1);

    f.runner.release.notify_one();
    let outcome = full.await.unwrap().unwrap();
    assert!(matches!(outcome, TaskOutcome::Synced { preempted: None, .. }));
}

#[tokio::test]
async fn test_disabled_connector_is_configuration_error() {
    let f = fixture(Behavior::Succeed(1), Behavior::Succeed(1));
    f.store.put(ldap_connector(ID, false, true));

    let err = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::FullSync))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TaskError::Configuration(ConnectorError::ConnectorDisabled { connector_id }) if connector_id == ID
    ));
    assert_eq!(f.runner.calls(), 0);
}

#[tokio::test]
async fn test_incremental_off_is_configuration_error() {
    let f = fixture(Behavior::Succeed(1), Behavior::Succeed(1));
    f.store.put(ldap_connector(ID, true, false));

    let err = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::IncrementalSync))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Configuration(_)));

    // Full sync stays available.
    f.executor
        .execute(&QueueMessage::new(ID, TaskKind::FullSync))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_connector_is_configuration_error() {
    let f = fixture(Behavior::Succeed(1), Behavior::Succeed(1));

    let err = f
        .executor
        .execute(&QueueMessage::new(
            ConnectorId::new(7),
            TaskKind::FullSync,
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TaskError::Configuration(ConnectorError::ConnectorNotFound { .. })
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_directory_is_retryable() {
    let f = fixture(Behavior::Unreachable, Behavior::Succeed(1));

    let err = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::FullSync))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(f.store.last_sync(ID).is_none());
    assert!(f.executor.admissions().is_empty());
}

#[tokio::test]
async fn test_terminate_cancels_run_and_purges_pending() {
    let f = fixture(Behavior::Block, Behavior::Succeed(1));

    let executor = f.executor.clone();
    let full = tokio::spawn(async move {
        executor
            .execute(&QueueMessage::new(ID, TaskKind::FullSync))
            .await
    });
    f.runner.started.notified().await;

    let queue: &dyn TaskQueue = f.queue.as_ref();
    submit(queue, &QueueMessage::new(ID, TaskKind::IncrementalSync))
        .await
        .unwrap();
    submit(queue, &QueueMessage::new(ID, TaskKind::FullSync))
        .await
        .unwrap();

    let outcome = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::Terminate))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TaskOutcome::Terminated {
            cancelled: Some(TaskKind::FullSync)
        }
    );

    assert!(matches!(full.await.unwrap(), Err(TaskError::Cancelled)));
    assert_eq!(f.runner.calls(), 1);
    assert!(f.queue.is_empty());
    assert!(f.executor.admissions().is_empty());
    assert!(f.store.last_sync(ID).is_none());
}

#[tokio::test]
async fn test_terminate_succeeds_with_unreachable_broker() {
    let f = fixture(Behavior::Block, Behavior::Succeed(1));
    let executor = Arc::new(TaskExecutor::new(
        f.store.clone(),
        f.runner.clone(),
        Arc::new(UnreachableQueue),
    ));

    let running = executor.clone();
    let full = tokio::spawn(async move {
        running
            .execute(&QueueMessage::new(ID, TaskKind::FullSync))
            .await
    });
    f.runner.started.notified().await;

    let outcome = executor
        .execute(&QueueMessage::new(ID, TaskKind::Terminate))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TaskOutcome::Terminated {
            cancelled: Some(TaskKind::FullSync)
        }
    );
    assert!(matches!(full.await.unwrap(), Err(TaskError::Cancelled)));
    assert!(executor.admissions().is_empty());
}

#[tokio::test]
async fn test_terminate_with_nothing_running() {
    let f = fixture(Behavior::Succeed(1), Behavior::Succeed(1));

    let outcome = f
        .executor
        .execute(&QueueMessage::new(ID, TaskKind::Terminate))
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Terminated { cancelled: None });
    assert_eq!(f.runner.calls(), 0);
}

#[tokio::test]
async fn test_other_connectors_are_independent() {
    let f = fixture(Behavior::Block, Behavior::Succeed(1));
    let other = ConnectorId::new(43);
    f.store.put(ldap_connector(other, true, true));

    let executor = f.executor.clone();
    let full = tokio::spawn(async move {
        executor
            .execute(&QueueMessage::new(ID, TaskKind::FullSync))
            .await
    });
    f.runner.started.notified().await;

    f.executor
        .execute(&QueueMessage::new(other, TaskKind::IncrementalSync))
        .await
        .unwrap();
    assert_eq!(
        f.executor.admissions().running_kind(ID),
        Some(TaskKind::FullSync)
    );

    f.runner.release.notify_one();
    full.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_keep_one_live_run() {
    let table = AdmissionTable::new();
    let kinds = [
        TaskKind::IncrementalSync,
        TaskKind::FullSync,
        TaskKind::Terminate,
    ];

    let mut handles = Vec::new();
    for worker in 0..8usize {
        let table = table.clone();
        handles.push(tokio::spawn(async move {
            let mut tickets = Vec::new();
            for round in 0..200usize {
                let kind = kinds[(worker + round) % kinds.len()];
                match table.admit(ID, kind) {
                    Admission::Proceed(ticket) | Admission::Preempted { ticket, .. } => {
                        tickets.push(ticket);
                    }
                    Admission::Rejected { active } => assert!(active.outranks(kind)),
                }
                if round % 16 == 0 {
                    tickets.clear();
                }
                tokio::task::yield_now().await;
            }
            tickets
        }));
    }

    let mut tickets = Vec::new();
    for handle in handles {
        tickets.extend(handle.await.unwrap());
    }

    let live: Vec<_> = tickets.iter().filter(|t| !t.is_cancelled()).collect();
    assert!(live.len() <= 1);
    match table.running_kind(ID) {
        Some(kind) => {
            assert_eq!(live.len(), 1);
            assert_eq!(live[0].kind(), kind);
        }
        None => assert!(live.is_empty()),
    }

    drop(tickets);
    assert!(table.is_empty());
}
