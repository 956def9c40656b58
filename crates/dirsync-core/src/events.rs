//! Connector change notifications.
//!
//! The change feed publishes `{table, action, id}` JSON documents. Only rows of
//! the connectors table are turned into [`ConnectorEvent`]s.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ParseError;
use crate::ids::ConnectorId;

/// Name of the table whose changes drive scheduling.
pub const CONNECTORS_TABLE: &str = "connectors";

/// Row-level action reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// Raw change-feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub table: String,
    pub action: ChangeAction,
    pub id: ConnectorId,
}

impl ChangeNotification {
    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Event for the scheduler, or `None` when the row is not a connector.
    #[must_use]
    pub fn into_event(self) -> Option<ConnectorEvent> {
        if !self.table.eq_ignore_ascii_case(CONNECTORS_TABLE) {
            return None;
        }
        Some(match self.action {
            ChangeAction::Insert => ConnectorEvent::Inserted(self.id),
            ChangeAction::Update => ConnectorEvent::Updated(self.id),
            ChangeAction::Delete => ConnectorEvent::Deleted(self.id),
        })
    }
}

/// Connector lifecycle event consumed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorEvent {
    Inserted(ConnectorId),
    Updated(ConnectorId),
    Deleted(ConnectorId),
}

impl ConnectorEvent {
    #[must_use]
    pub fn connector_id(&self) -> ConnectorId {
        match self {
            Self::Inserted(id) | Self::Updated(id) | Self::Deleted(id) => *id,
        }
    }
}

impl fmt::Display for ConnectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted(id) => write!(f, "inserted({id})"),
            Self::Updated(id) => write!(f, "updated({id})"),
            Self::Deleted(id) => write!(f, "deleted({id})"),
        }
    }
}
