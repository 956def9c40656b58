//! # dirsync connector model
//!
//! Everything the scheduler, the worker and the sync engine share about a
//! connector: its persisted row, its typed settings, the credential cipher,
//! the attribute mapping onto local users and the storage seams.
//!
//! ## Crate Organization
//!
//! - [`model`] - Persisted connector row
//! - [`types`] - Connector type tag
//! - [`config`] - Typed settings parsed once per connector type
//! - [`crypto`] - AES-256-GCM credential cipher
//! - [`mapping`] - Directory attribute to user field mapping
//! - [`entry`] - Protocol-neutral directory entry
//! - [`user`] - Local user record
//! - [`timestamp`] - Directory generalized-time encoding
//! - [`store`] - Connector, user and change-feed seams
//! - [`sync`] - Sync mode and the engine seam
//! - [`error`] - Error types with transient/permanent classification

pub mod config;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod mapping;
pub mod model;
pub mod store;
pub mod sync;
pub mod timestamp;
pub mod types;
pub mod user;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ConnectorSettings, LdapSettings, SyncSettings};
    pub use crate::crypto::CredentialCipher;
    pub use crate::entry::DirectoryEntry;
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::mapping::AttributeMapping;
    pub use crate::model::Connector;
    pub use crate::store::{ConnectorChangeFeed, ConnectorStore, UserStore};
    pub use crate::sync::{SyncMode, SyncRunner};
    pub use crate::types::ConnectorType;
    pub use crate::user::UserRecord;
    pub use dirsync_core::ConnectorId;
}
