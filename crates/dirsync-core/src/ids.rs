//! Newtype wrapper for connector identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Unique numeric identifier of a connector row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(u64);

impl ConnectorId {
    /// Create a ConnectorId from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner numeric value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectorId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|source| ParseError::InvalidConnectorId {
                value: s.to_string(),
                source,
            })
    }
}

impl From<u64> for ConnectorId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ConnectorId> for u64 {
    fn from(id: ConnectorId) -> Self {
        id.0
    }
}
