//! The syncer seam between the poll loop and the application.
//!
//! [`SyncClient`](crate::SyncClient) drives a [`Syncer`]: it hands every
//! fetched response to `process_response`, persists cursors through
//! `cursor_store`, bootstraps filters through `filter_store`, and asks
//! `on_failed_sync` what to do after a failed fetch.

use roomsync_core::{
    EventListener, FailurePolicy, FixedDelay, ListenerError, ReduceError, ResponseReducer, Retry,
    RoomTable,
};
use roomsync_types::{Cursor, Event, SyncResponse, UserId};
use std::sync::Arc;
use std::time::Duration;

use crate::client::ClientError;
use crate::config::SyncConfig;
use crate::store::{CursorStore, FilterStore};
use crate::transport::TransportError;

/// Interprets sync responses on behalf of one account.
pub trait Syncer: Send {
    /// Apply a response that was fetched with cursor `since`.
    fn process_response(
        &mut self,
        response: SyncResponse,
        since: &Cursor,
    ) -> Result<(), ReduceError>;

    /// Where the poll loop saves and loads its resumption token.
    fn cursor_store(&self) -> &dyn CursorStore;

    /// Where the poll loop saves and loads the filter ID.
    fn filter_store(&self) -> &dyn FilterStore;

    /// Decide what to do after a failed fetch: wait this long, or stop.
    fn on_failed_sync(
        &mut self,
        last_response: Option<&SyncResponse>,
        error: &TransportError,
    ) -> Result<Duration, ClientError>;

    /// Called after each response is reduced.
    fn on_sync_succeeded(&mut self) {}
}

/// Syncer built from a [`ResponseReducer`], two stores and a
/// [`FailurePolicy`].
pub struct DefaultSyncer {
    reducer: ResponseReducer,
    cursor_store: Arc<dyn CursorStore>,
    filter_store: Arc<dyn FilterStore>,
    policy: Box<dyn FailurePolicy>,
}

impl DefaultSyncer {
    /// Create a syncer for `user_id` that retries every 10 seconds forever.
    pub fn new(
        user_id: UserId,
        cursor_store: Arc<dyn CursorStore>,
        filter_store: Arc<dyn FilterStore>,
    ) -> Self {
        Self {
            reducer: ResponseReducer::new(user_id),
            cursor_store,
            filter_store,
            policy: Box::new(FixedDelay::default()),
        }
    }

    /// Create a syncer for the configured account that retries every
    /// `config.retry_delay()` forever.
    pub fn from_config(
        config: &SyncConfig,
        cursor_store: Arc<dyn CursorStore>,
        filter_store: Arc<dyn FilterStore>,
    ) -> Self {
        Self::new(config.user_id.clone(), cursor_store, filter_store)
            .with_policy(FixedDelay::new(config.retry_delay()))
    }

    /// Replace the failure policy.
    pub fn with_policy(mut self, policy: impl FailurePolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Register a closure for `event_type`.
    pub fn on_event_type<F>(&mut self, event_type: &str, callback: F)
    where
        F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.reducer.on_event_type(event_type, callback);
    }

    /// Register a listener for `event_type`.
    pub fn subscribe(&mut self, event_type: &str, listener: Arc<dyn EventListener>) {
        self.reducer.subscribe(event_type, listener);
    }

    /// The account being synced.
    pub fn user_id(&self) -> &UserId {
        self.reducer.user_id()
    }

    /// Room state accumulated so far.
    pub fn rooms(&self) -> &RoomTable {
        self.reducer.rooms()
    }
}

impl Syncer for DefaultSyncer {
    fn process_response(
        &mut self,
        response: SyncResponse,
        since: &Cursor,
    ) -> Result<(), ReduceError> {
        self.reducer.process_response(response, since)
    }

    fn cursor_store(&self) -> &dyn CursorStore {
        self.cursor_store.as_ref()
    }

    fn filter_store(&self) -> &dyn FilterStore {
        self.filter_store.as_ref()
    }

    fn on_failed_sync(
        &mut self,
        last_response: Option<&SyncResponse>,
        error: &TransportError,
    ) -> Result<Duration, ClientError> {
        match self.policy.on_failed_sync(last_response, error) {
            Retry::After(delay) => Ok(delay),
            Retry::Stop { reason } => Err(ClientError::Stopped(reason)),
        }
    }

    fn on_sync_succeeded(&mut self) {
        self.policy.on_sync_succeeded();
    }
}

impl std::fmt::Debug for DefaultSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSyncer")
            .field("user_id", self.reducer.user_id())
            .field("rooms", &self.reducer.rooms().len())
            .finish_non_exhaustive()
    }
}
