//! Protocol errors.

use thiserror::Error;

/// Result alias for wire-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding protocol units.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound frame was not valid JSON or did not have the expected shape.
    #[error("malformed inbound frame: {source}")]
    Malformed {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Outgoing request could not be serialized.
    #[error("failed to encode request: {source}")]
    Encode {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Outgoing request carries no text after trimming.
    #[error("message is empty")]
    EmptyMessage,
}
