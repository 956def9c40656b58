//! # dirsync worker
//!
//! Consumes sync tasks from the broker and runs them with at most one active
//! run per connector.
//!
//! ## Priority
//!
//! `terminate` > `full_sync` > `incremental_sync`. An incoming task is
//! rejected while a higher-priority one runs for the same connector;
//! otherwise it preempts the running one by cancelling its token.
//!
//! ## Crate Organization
//!
//! - [`admission`] - RunningTask table and admission decisions
//! - [`executor`] - Executes one task message
//! - [`worker`] - Claim loop, acknowledgement policy and cancel sweep
//! - [`error`] - Task error taxonomy

pub mod admission;
pub mod error;
pub mod executor;
pub mod worker;

pub use admission::{Admission, AdmissionTable, RunTicket};
pub use error::{TaskError, TaskResult};
pub use executor::{TaskExecutor, TaskOutcome};
pub use worker::{SyncWorker, WorkerConfig};
