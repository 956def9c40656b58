//! # dirsync core types
//!
//! Identifiers and value objects shared by the scheduler, the worker and the
//! storage layer.
//!
//! - [`ids`] - Type-safe connector identifier
//! - [`task`] - Task kinds, priorities and queue lanes
//! - [`message`] - Queue payload crossing the broker boundary
//! - [`events`] - Connector change notifications

pub mod error;
pub mod events;
pub mod ids;
pub mod message;
pub mod task;

pub use error::ParseError;
pub use events::{ChangeAction, ChangeNotification, ConnectorEvent};
pub use ids::ConnectorId;
pub use message::QueueMessage;
pub use task::{Queue, TaskKind};
