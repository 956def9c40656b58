//! # dirsync-db
//!
//! Postgres persistence for dirsync.
//!
//! - `models`: row types with their queries
//! - [`PgConnectorStore`] / [`PgUserStore`]: the connector crate's storage seams
//! - [`PgTaskQueue`]: durable task broker on the `task_queue` table
//! - [`PgChangeFeed`]: `LISTEN` on the connector change channel
//!
//! Migrations are embedded and applied with [`run_migrations`].

pub mod error;
pub mod listener;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queue;
pub mod repository;

pub use error::DbError;
pub use listener::{PgChangeFeed, DEFAULT_CHANGE_CHANNEL};
pub use migrations::run_migrations;
pub use pool::DbPool;
pub use queue::PgTaskQueue;
pub use repository::{PgConnectorStore, PgUserStore};
