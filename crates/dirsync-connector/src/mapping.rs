//! Mapping of directory attributes onto local user fields.

use serde::{Deserialize, Serialize};
use tracing::debug;

use dirsync_core::ConnectorId;

use crate::entry::DirectoryEntry;
use crate::timestamp::parse_generalized_time;
use crate::user::UserRecord;

/// `accountExpires` value meaning "never expires".
pub const ACTIVE_SENTINEL: &str = "9223372036854775807";

/// Attribute names used to build a [`UserRecord`]. Defaults follow Active Directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeMapping {
    pub external_id: String,
    pub username: String,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub created: String,
    pub updated: String,
    /// The user is active iff this attribute equals [`ACTIVE_SENTINEL`].
    pub active: String,
}

impl Default for AttributeMapping {
    fn default() -> Self {
        Self {
            external_id: "uuid".to_string(),
            username: "sAMAccountName".to_string(),
            full_name: "cn".to_string(),
            phone: "mobile".to_string(),
            email: "mail".to_string(),
            created: "whenCreated".to_string(),
            updated: "whenChanged".to_string(),
            active: "accountExpires".to_string(),
        }
    }
}

impl AttributeMapping {
    /// Attributes to request from the directory.
    #[must_use]
    pub fn requested_attributes(&self) -> Vec<String> {
        let mut attrs = vec![
            self.external_id.clone(),
            self.username.clone(),
            self.full_name.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.created.clone(),
            self.updated.clone(),
            self.active.clone(),
        ];
        attrs.retain(|a| !a.is_empty());
        attrs.sort();
        attrs.dedup();
        attrs
    }

    /// Map an entry; `None` when it has no username.
    #[must_use]
    pub fn map_entry(&self, entry: &DirectoryEntry, source_id: ConnectorId) -> Option<UserRecord> {
        let Some(username) = entry.first(&self.username).filter(|u| !u.is_empty()) else {
            debug!(dn = %entry.dn, attribute = %self.username, "Skipping entry without username");
            return None;
        };

        let text = |name: &str| entry.first(name).map(str::to_string);

        Some(UserRecord {
            external_id: text(&self.external_id),
            username: username.to_string(),
            full_name: text(&self.full_name),
            phone_number: text(&self.phone),
            email: text(&self.email),
            active: entry.first(&self.active) == Some(ACTIVE_SENTINEL),
            source_id,
            data: entry.to_json(),
            created_at: entry.first(&self.created).and_then(parse_generalized_time),
            updated_at: entry.first(&self.updated).and_then(parse_generalized_time),
        })
    }
}
