//! Connector type tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConnectorError;

/// Type of an identity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// LDAP / Active Directory.
    Ldap,
}

impl ConnectorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectorType::Ldap => "ldap",
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorType {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ldap" => Ok(ConnectorType::Ldap),
            _ => Err(ConnectorError::UnsupportedConnectorType {
                connector_type: s.to_string(),
            }),
        }
    }
}
