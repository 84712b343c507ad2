//! Mock transport for testing.
//!
//! Allows scripting sync outcomes and capturing requests for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use roomsync_types::{FilterDefinition, FilterId, SyncRequest, SyncResponse, UserId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Scripted outcomes are returned in order. Once the script runs out,
/// `sync()` hangs like an idle long-poll until the caller gives up.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    outcomes: VecDeque<Result<SyncResponse, TransportError>>,
    requests: Vec<SyncRequest>,
    uploaded_filters: Vec<(UserId, FilterDefinition)>,
    filter_id: Option<String>,
    fail_next_filter: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to be returned by a future `sync()` call.
    pub fn queue_response(&self, response: SyncResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.outcomes.push_back(Ok(response));
    }

    /// Queue a failure to be returned by a future `sync()` call.
    pub fn queue_error(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.outcomes.push_back(Err(error));
    }

    /// Get all sync requests that were issued.
    pub fn requests(&self) -> Vec<SyncRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.clone()
    }

    /// Get the last sync request that was issued.
    pub fn last_request(&self) -> Option<SyncRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.last().cloned()
    }

    /// Get all filters that were uploaded.
    pub fn uploaded_filters(&self) -> Vec<(UserId, FilterDefinition)> {
        let inner = self.inner.lock().unwrap();
        inner.uploaded_filters.clone()
    }

    /// Set the ID returned by `create_filter()` (default: `"filter-0"`).
    pub fn set_filter_id(&self, filter_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.filter_id = Some(filter_id.to_string());
    }

    /// Cause the next create_filter() to fail with the given error.
    pub fn fail_next_filter(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_filter = Some(error.to_string());
    }

    /// Wait until at least `count` sync requests have been issued.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.inner.lock().unwrap().requests.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            notify: Arc::clone(&self.notify),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request.clone());
            inner.outcomes.pop_front()
        };
        self.notify.notify_waiters();

        match next {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }

    async fn create_filter(
        &self,
        user_id: &UserId,
        filter: &FilterDefinition,
    ) -> Result<FilterId, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_filter.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        let upload = (user_id.clone(), filter.clone());
        inner.uploaded_filters.push(upload);
        let filter_id = inner
            .filter_id
            .clone()
            .unwrap_or_else(|| "filter-0".to_string());
        Ok(FilterId::new(filter_id))
    }
}
