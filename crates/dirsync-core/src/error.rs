//! Parse errors for core value types.

use thiserror::Error;

/// Error returned when a textual or JSON value cannot be turned into a core type.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Unknown task kind.
    #[error("unknown task kind: {0}")]
    UnknownTaskKind(String),

    /// Unknown queue lane.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// Invalid connector identifier.
    #[error("invalid connector id '{value}': {source}")]
    InvalidConnectorId {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Malformed JSON payload.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}
