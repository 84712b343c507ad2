//! Error types for roomsync wire data.

use thiserror::Error;

/// Errors that can occur decoding or encoding sync protocol data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// An event content field was absent or had an unexpected shape.
///
/// Content is free-form JSON, so callers treat these as "not applicable"
/// rather than as protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// The key is not present in the content object.
    #[error("content key `{key}` is missing")]
    Missing {
        /// The requested key.
        key: String,
    },

    /// The key is present but holds a different JSON type.
    #[error("content key `{key}` is not a {expected}")]
    WrongShape {
        /// The requested key.
        key: String,
        /// The JSON type the caller asked for.
        expected: &'static str,
    },
}
