//! Local user record produced by a sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dirsync_core::ConnectorId;

/// User row keyed by `username`. The primary id is assigned by the store on
/// first insert and never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub external_id: Option<String>,
    pub username: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub source_id: ConnectorId,
    /// Raw directory attributes.
    pub data: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
