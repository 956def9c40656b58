//! Connector error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

use dirsync_core::ConnectorId;

/// Error that can occur while loading, parsing or syncing a connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (transient)
    /// Failed to establish a connection to the directory.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection attempt timed out.
    #[error("connection timeout after {timeout_ms} ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Bind rejected by the directory.
    #[error("authentication failed: invalid credentials for {bind_dn}")]
    AuthenticationFailed { bind_dn: String },

    /// Paged search failed or timed out.
    #[error("search failed: {message}")]
    SearchFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No pooled connection became available in time.
    #[error("connection pool exhausted after waiting {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },

    /// Pool was closed while a checkout was pending.
    #[error("connection pool for {url} is closed")]
    PoolClosed { url: String },

    /// Local store read or write failed.
    #[error("store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Configuration errors (permanent)
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Connector type is not supported.
    #[error("unsupported connector type: {connector_type}")]
    UnsupportedConnectorType { connector_type: String },

    /// Connector not found.
    #[error("connector not found: {connector_id}")]
    ConnectorNotFound { connector_id: ConnectorId },

    /// Connector exists but is disabled.
    #[error("connector {connector_id} is disabled")]
    ConnectorDisabled { connector_id: ConnectorId },

    // Encryption errors (permanent)
    /// Credential encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed { message: String },

    /// Credential decryption failed.
    #[error("decryption failed: {message}")]
    DecryptionFailed { message: String },

    /// Run was cancelled through its token.
    #[error("sync cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::ConnectionTimeout { .. }
                | ConnectorError::AuthenticationFailed { .. }
                | ConnectorError::SearchFailed { .. }
                | ConnectorError::PoolExhausted { .. }
                | ConnectorError::PoolClosed { .. }
                | ConnectorError::Store { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient() && !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectorError::Cancelled)
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            ConnectorError::AuthenticationFailed { .. } => "AUTH_FAILED",
            ConnectorError::SearchFailed { .. } => "SEARCH_FAILED",
            ConnectorError::PoolExhausted { .. } => "POOL_EXHAUSTED",
            ConnectorError::PoolClosed { .. } => "POOL_CLOSED",
            ConnectorError::Store { .. } => "STORE_ERROR",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::UnsupportedConnectorType { .. } => "UNSUPPORTED_TYPE",
            ConnectorError::ConnectorNotFound { .. } => "CONNECTOR_NOT_FOUND",
            ConnectorError::ConnectorDisabled { .. } => "CONNECTOR_DISABLED",
            ConnectorError::EncryptionFailed { .. } => "ENCRYPTION_FAILED",
            ConnectorError::DecryptionFailed { .. } => "DECRYPTION_FAILED",
            ConnectorError::Cancelled => "CANCELLED",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(message: impl Into<String>) -> Self {
        ConnectorError::SearchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::SearchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        ConnectorError::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a store error with source.
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ConnectorError::connection_failed("refused").is_transient());
        assert!(ConnectorError::ConnectionTimeout { timeout_ms: 5000 }.is_transient());
        assert!(ConnectorError::search_failed("timelimit exceeded").is_transient());
        assert!(ConnectorError::PoolExhausted { waited_ms: 30_000 }.is_transient());
        assert!(ConnectorError::store("deadlock detected").is_transient());
        assert!(ConnectorError::AuthenticationFailed {
            bind_dn: "cn=svc".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(ConnectorError::invalid_config("batch size must be positive").is_permanent());
        assert!(ConnectorError::DecryptionFailed {
            message: "tag mismatch".to_string()
        }
        .is_permanent());
        assert!(ConnectorError::UnsupportedConnectorType {
            connector_type: "scim".to_string()
        }
        .is_permanent());
        assert!(ConnectorError::ConnectorDisabled {
            connector_id: ConnectorId::new(1)
        }
        .is_permanent());
    }

    #[test]
    fn test_cancelled_is_neither() {
        let err = ConnectorError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_transient());
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ConnectorError::connection_failed("x").error_code(),
            "CONNECTION_FAILED"
        );
        assert_eq!(
            ConnectorError::invalid_config("x").error_code(),
            "INVALID_CONFIG"
        );
        assert_eq!(ConnectorError::Cancelled.error_code(), "CANCELLED");
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::ConnectorNotFound {
            connector_id: ConnectorId::new(42),
        };
        assert_eq!(err.to_string(), "connector not found: 42");
    }

    #[test]
    fn test_source_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ConnectorError::connection_failed_with_source("dial ldap://dc1", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
