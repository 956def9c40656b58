//! # dirsync scheduler
//!
//! Keeps exactly one recurring incremental-sync timer per connector that is
//! enabled with incremental sync on, and follows configuration drift through
//! the connector change feed.
//!
//! Each timer dispatches a [`ScheduledTick`] to the stateless [`Ticker`],
//! which enqueues an `incremental_sync` task unless the connector already has
//! a queued full sync or an in-flight incremental one.

pub mod error;
pub mod scheduler;
pub mod table;
pub mod tick;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{BootstrapReport, SyncScheduler};
pub use table::ScheduleTable;
pub use tick::{ScheduledTick, TickOutcome, Ticker};
