//! Transport abstraction for roomsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! homeserver's client API (HTTP in production, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and request/response oriented:
//! - `sync()` issues one long-poll fetch and returns the parsed response
//! - `create_filter()` uploads a filter definition and returns its ID
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.queue_response(SyncResponse::new("s1"));
//! let response = transport.sync(&SyncRequest::new(Cursor::initial())).await?;
//! ```

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use roomsync_types::{FilterDefinition, FilterId, SyncRequest, SyncResponse, UserId};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Server answered with an error status.
    #[error("server returned {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error body or reason phrase.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Request timed out.
    #[error("request timeout")]
    Timeout,
}

impl From<roomsync_types::SyncError> for TransportError {
    fn from(e: roomsync_types::SyncError) -> Self {
        TransportError::InvalidResponse(e.to_string())
    }
}

/// Transport trait for the homeserver's sync API.
///
/// Implementations handle the underlying connection mechanism
/// (HTTP, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one long-poll fetch.
    ///
    /// Blocks until the server answers or its timeout elapses.
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError>;

    /// Upload a filter definition for `user_id` and return its server ID.
    async fn create_filter(
        &self,
        user_id: &UserId,
        filter: &FilterDefinition,
    ) -> Result<FilterId, TransportError>;
}
