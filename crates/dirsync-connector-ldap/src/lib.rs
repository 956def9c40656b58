//! # LDAP directory sync
//!
//! Opens authenticated connections to LDAP / Active Directory servers, pools
//! them per endpoint and enumerates users page by page into the local store.
//!
//! - [`client`] - Session and dialer seams
//! - [`ldap`] - `ldap3` implementation of the seams
//! - [`pool`] - Bounded connection pool with liveness re-bind on return
//! - [`search`] - Paged search request/response and filter building
//! - [`sync`] - The sync engine

pub mod client;
pub mod ldap;
pub mod pool;
pub mod search;
pub mod sync;

pub use client::{BindCredentials, DirectoryDialer, DirectorySession, Endpoint};
pub use ldap::LdapDialer;
pub use pool::{DirectoryClient, DirectoryPool, PoolConfig, PooledSession};
pub use search::{Page, PageRequest};
pub use sync::DirectorySyncEngine;
