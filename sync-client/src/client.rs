//! SyncClient - the main interface for roomsync.
//!
//! This module provides [`SyncClient`], which runs the long-poll loop for
//! one account: fetch, reduce, persist the cursor, repeat.
//!
//! # Architecture
//!
//! SyncClient uses a pure state machine (from sync-core) for the loop logic
//! and interprets the actions to perform actual I/O via the Transport trait
//! and the Syncer's stores.
//!
//! ```text
//! Application → SyncClient → Transport → Homeserver
//!                   ↓
//!              sync-core (pure state machine)
//!                   ↓
//!               Syncer → listeners
//! ```
//!
//! # Example
//!
//! ```ignore
//! use roomsync_client::{
//!     DefaultSyncer, MemoryCursorStore, MemoryFilterStore, SyncClient, SyncConfig,
//! };
//!
//! let config = SyncConfig::new("@bot:example.org");
//! let mut syncer = DefaultSyncer::from_config(
//!     &config,
//!     Arc::new(MemoryCursorStore::new()),
//!     Arc::new(MemoryFilterStore::new()),
//! );
//! syncer.on_event_type("m.room.message", |event| {
//!     println!("{}: {:?}", event.sender, event.body());
//!     Ok(())
//! });
//!
//! let mut client = SyncClient::new(config, transport, syncer);
//! let stop = client.stop_handle();
//! client.sync().await?;
//! ```

use roomsync_core::{PollAction, PollEvent, PollState, ReduceError, Retry, StopReason};
use roomsync_types::{FilterId, SyncResponse, UserId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::SyncConfig;
use crate::syncer::{DefaultSyncer, Syncer};
use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Uploading the filter failed.
    #[error("filter creation failed: {0}")]
    Filter(#[source] TransportError),

    /// A response could not be reduced.
    #[error(transparent)]
    Reduce(#[from] ReduceError),

    /// The failure policy gave up.
    #[error("sync stopped: {0}")]
    Stopped(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Stops a running [`SyncClient::sync`] from another task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<u64>>,
}

impl StopHandle {
    /// Stop the sync that is currently running.
    ///
    /// Has no effect on a sync started afterwards.
    pub fn stop(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// The main sync client.
///
/// Owns the transport and the syncer; only one `sync()` runs at a time.
pub struct SyncClient<T: Transport, S: Syncer = DefaultSyncer> {
    config: SyncConfig,
    transport: T,
    syncer: S,
    stop_tx: Arc<watch::Sender<u64>>,
}

impl<T: Transport, S: Syncer> SyncClient<T, S> {
    /// Create a new SyncClient.
    pub fn new(config: SyncConfig, transport: T, syncer: S) -> Self {
        let (stop_tx, _) = watch::channel(0);
        Self {
            config,
            transport,
            syncer,
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// A handle that can stop the running sync from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Stop the sync that is currently running.
    pub fn stop_sync(&self) {
        self.stop_handle().stop();
    }

    /// The client's configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The syncer.
    pub fn syncer(&self) -> &S {
        &self.syncer
    }

    /// The syncer, mutably (to subscribe listeners between syncs).
    pub fn syncer_mut(&mut self) -> &mut S {
        &mut self.syncer
    }

    /// Run the long-poll loop until stopped.
    ///
    /// Returns `Ok(())` when stopped through [`StopHandle::stop`], or an
    /// error when the failure policy gives up, a response cannot be
    /// reduced, or the filter cannot be created.
    pub async fn sync(&mut self) -> Result<(), ClientError> {
        let mut stop = self.stop_tx.subscribe();
        let user_id = self.config.user_id.clone();
        tracing::info!("Starting sync for {}", user_id);

        let Some(filter) = self.ensure_filter(&user_id, &mut stop).await? else {
            tracing::info!("Sync for {} stopped during filter setup", user_id);
            return Ok(());
        };

        let since = self.syncer.cursor_store().load_cursor(&user_id);
        let mut pending: Option<SyncResponse> = None;
        let mut failure: Option<ClientError> = None;
        let (mut state, mut actions) = PollState::new().on_event(PollEvent::Start { since });

        loop {
            let Some(action) = actions.pop() else {
                return Err(ClientError::Protocol(format!(
                    "poll loop stalled in {:?}",
                    state
                )));
            };

            let event = match action {
                PollAction::Fetch { since, attempt } => {
                    let request = self.config.request(since, Some(filter.clone()));
                    let fetched = tokio::select! {
                        biased;
                        _ = stop.changed() => None,
                        result = self.transport.sync(&request) => Some(result),
                    };

                    match fetched {
                        None => PollEvent::StopRequested,
                        Some(Ok(response)) => {
                            let next_batch = response.next_batch.clone();
                            pending = Some(response);
                            PollEvent::FetchSucceeded { next_batch }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                "Sync for {} failed after {} previous failures: {}",
                                user_id,
                                attempt,
                                e
                            );
                            let decision = match self.syncer.on_failed_sync(None, &e) {
                                Ok(delay) => Retry::After(delay),
                                Err(gave_up) => {
                                    let reason = gave_up.to_string();
                                    failure = Some(gave_up);
                                    Retry::Stop { reason }
                                }
                            };
                            PollEvent::FetchFailed { decision }
                        }
                    }
                }

                PollAction::Reduce { since } => match pending.take() {
                    Some(response) => match self.syncer.process_response(response, &since) {
                        Ok(()) => {
                            self.syncer.on_sync_succeeded();
                            PollEvent::Reduced
                        }
                        Err(e) => {
                            let error = e.to_string();
                            failure = Some(ClientError::Reduce(e));
                            PollEvent::ReduceFailed { error }
                        }
                    },
                    None => {
                        let error = ClientError::Protocol("no response to reduce".to_string());
                        return Err(error);
                    }
                },

                PollAction::PersistCursor { cursor } => {
                    self.syncer.cursor_store().save_cursor(&user_id, &cursor);
                    PollEvent::Persisted
                }

                PollAction::Wait { delay } => {
                    tracing::debug!("Retrying sync for {} in {:?}", user_id, delay);
                    let stopped = tokio::select! {
                        biased;
                        _ = stop.changed() => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    if stopped {
                        PollEvent::StopRequested
                    } else {
                        PollEvent::BackoffElapsed
                    }
                }

                PollAction::Stop { reason } => return finish(&user_id, reason, failure),
            };

            (state, actions) = state.on_event(event);
        }
    }

    /// Load the saved filter ID, creating and saving one if missing.
    ///
    /// Returns `None` if stopped while the upload was in flight.
    async fn ensure_filter(
        &mut self,
        user_id: &UserId,
        stop: &mut watch::Receiver<u64>,
    ) -> Result<Option<FilterId>, ClientError> {
        if let Some(filter_id) = self.syncer.filter_store().load_filter_id(user_id) {
            return Ok(Some(filter_id));
        }

        let definition = self.syncer.filter_store().filter_definition();
        let created = tokio::select! {
            biased;
            _ = stop.changed() => return Ok(None),
            result = self.transport.create_filter(user_id, &definition) => result,
        };

        let filter_id = created.map_err(ClientError::Filter)?;
        tracing::info!("Created filter {} for {}", filter_id, user_id);
        self.syncer
            .filter_store()
            .save_filter_id(user_id, &filter_id);
        Ok(Some(filter_id))
    }
}

fn finish(
    user_id: &UserId,
    reason: StopReason,
    failure: Option<ClientError>,
) -> Result<(), ClientError> {
    match reason {
        StopReason::Requested => {
            tracing::info!("Sync for {} stopped", user_id);
            Ok(())
        }
        StopReason::GaveUp(reason) | StopReason::ReduceFailed(reason) => {
            tracing::error!("Sync for {} stopped: {}", user_id, reason);
            Err(failure.unwrap_or(ClientError::Stopped(reason)))
        }
        StopReason::InvalidCursor => {
            tracing::error!("Sync for {} stopped: empty next_batch", user_id);
            Err(ClientError::Protocol(
                "server returned an empty next_batch".to_string(),
            ))
        }
    }
}

impl<T: Transport, S: Syncer + std::fmt::Debug> std::fmt::Debug for SyncClient<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("config", &self.config)
            .field("syncer", &self.syncer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CursorStore, FilterStore, MemoryCursorStore, MemoryFilterStore};
    use crate::transport::MockTransport;
    use roomsync_types::{Content, Cursor, Event, FilterDefinition, JoinedRoom};
    use serde_json::json;
    use std::sync::Mutex;

    const BOT: &str = "@bot:example.org";

    struct Fixture {
        transport: MockTransport,
        cursors: Arc<MemoryCursorStore>,
        filters: Arc<MemoryFilterStore>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                transport: MockTransport::new(),
                cursors: Arc::new(MemoryCursorStore::new()),
                filters: Arc::new(MemoryFilterStore::new()),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn client(&self) -> SyncClient<MockTransport> {
            let mut syncer = DefaultSyncer::new(
                UserId::new(BOT),
                self.cursors.clone(),
                self.filters.clone(),
            );
            let seen = Arc::clone(&self.seen);
            syncer.on_event_type("m.room.message", move |event| {
                seen.lock()
                    .unwrap()
                    .push(event.body().unwrap_or_default().to_string());
                Ok(())
            });
            SyncClient::new(SyncConfig::new(BOT), self.transport.clone(), syncer)
        }
    }

    fn with_message(next_batch: &str, body: &str) -> SyncResponse {
        let event = Event::new("m.room.message", Content::new().with("body", body))
            .with_sender("@alice:example.org");
        SyncResponse::new(next_batch)
            .with_joined_room("!room:example.org", JoinedRoom::new(vec![], vec![event]))
    }

    // ===========================================
    // Filter Bootstrap Tests
    // ===========================================

    #[tokio::test]
    async fn missing_filter_is_created_and_saved() {
        let fx = Fixture {
            filters: Arc::new(MemoryFilterStore::with_definition(FilterDefinition::new(
                json!({"room": {"timeline": {"limit": 10}}}),
            ))),
            ..Fixture::new()
        };
        fx.transport.set_filter_id("f42");
        let mut client = fx.client();

        let stop = client.stop_handle();
        let transport = fx.transport.clone();
        tokio::spawn(async move {
            transport.wait_for_requests(1).await;
            stop.stop();
        });
        client.sync().await.unwrap();

        let uploaded = fx.transport.uploaded_filters();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].1.as_json()["room"]["timeline"]["limit"], 10);
        assert_eq!(
            fx.filters.load_filter_id(&UserId::new(BOT)),
            Some(FilterId::new("f42"))
        );
        assert_eq!(
            fx.transport.last_request().unwrap().filter,
            Some(FilterId::new("f42"))
        );
    }

    #[tokio::test]
    async fn saved_filter_is_reused() {
        let fx = Fixture::new();
        fx.filters
            .save_filter_id(&UserId::new(BOT), &FilterId::new("existing"));
        let mut client = fx.client();

        let stop = client.stop_handle();
        let transport = fx.transport.clone();
        tokio::spawn(async move {
            transport.wait_for_requests(1).await;
            stop.stop();
        });
        client.sync().await.unwrap();

        assert!(fx.transport.uploaded_filters().is_empty());
        assert_eq!(
            fx.transport.last_request().unwrap().filter,
            Some(FilterId::new("existing"))
        );
    }

    #[tokio::test]
    async fn filter_failure_is_returned() {
        let fx = Fixture::new();
        fx.transport.fail_next_filter("forbidden");
        let mut client = fx.client();

        let result = client.sync().await;

        assert!(matches!(result, Err(ClientError::Filter(_))));
        assert!(fx.transport.requests().is_empty());
    }

    // ===========================================
    // Poll Loop Tests
    // ===========================================

    #[tokio::test]
    async fn initial_sync_is_persisted_but_not_dispatched() {
        let fx = Fixture::new();
        fx.transport.queue_response(with_message("s1", "backlog"));
        fx.transport.queue_response(with_message("s2", "fresh"));
        let mut client = fx.client();

        let stop = client.stop_handle();
        let transport = fx.transport.clone();
        tokio::spawn(async move {
            transport.wait_for_requests(3).await;
            stop.stop();
        });
        client.sync().await.unwrap();

        let requests = fx.transport.requests();
        assert!(requests[0].since.is_initial());
        assert_eq!(requests[1].since, Cursor::new("s1"));
        assert_eq!(requests[2].since, Cursor::new("s2"));
        assert_eq!(*fx.seen.lock().unwrap(), vec!["fresh".to_string()]);
        assert_eq!(fx.cursors.load_cursor(&UserId::new(BOT)), Cursor::new("s2"));
    }

    #[tokio::test]
    async fn resumes_from_saved_cursor() {
        let fx = Fixture::new();
        fx.cursors
            .save_cursor(&UserId::new(BOT), &Cursor::new("s5"));
        fx.transport.queue_response(with_message("s6", "hello"));
        let mut client = fx.client();

        let stop = client.stop_handle();
        let transport = fx.transport.clone();
        tokio::spawn(async move {
            transport.wait_for_requests(2).await;
            stop.stop();
        });
        client.sync().await.unwrap();

        assert_eq!(fx.transport.requests()[0].since, Cursor::new("s5"));
        assert_eq!(*fx.seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn request_carries_config() {
        let fx = Fixture::new();
        let mut syncer = DefaultSyncer::new(
            UserId::new(BOT),
            fx.cursors.clone(),
            fx.filters.clone(),
        );
        syncer.on_event_type("m.room.message", |_| Ok(()));
        let config = SyncConfig::new(BOT)
            .with_timeout_ms(1234)
            .with_presence("offline");
        let mut client = SyncClient::new(config, fx.transport.clone(), syncer);

        let stop = client.stop_handle();
        let transport = fx.transport.clone();
        tokio::spawn(async move {
            transport.wait_for_requests(1).await;
            stop.stop();
        });
        client.sync().await.unwrap();

        let request = fx.transport.last_request().unwrap();
        assert_eq!(request.timeout_ms, 1234);
        assert_eq!(request.set_presence.as_deref(), Some("offline"));
        assert!(!request.full_state);
    }

    #[tokio::test]
    async fn empty_next_batch_is_a_protocol_error() {
        let fx = Fixture::new();
        fx.transport.queue_response(SyncResponse::new(""));
        let mut client = fx.client();

        let result = client.sync().await;

        assert!(matches!(result, Err(ClientError::Protocol(_))));
        assert!(fx.cursors.load_cursor(&UserId::new(BOT)).is_initial());
    }

    // ===========================================
    // Stop Tests
    // ===========================================

    #[tokio::test]
    async fn stop_before_sync_does_not_affect_it() {
        let fx = Fixture::new();
        fx.transport.queue_response(with_message("s1", "x"));
        let mut client = fx.client();
        client.stop_sync();

        let stop = client.stop_handle();
        let transport = fx.transport.clone();
        tokio::spawn(async move {
            transport.wait_for_requests(2).await;
            stop.stop();
        });
        client.sync().await.unwrap();

        assert_eq!(fx.transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_backoff() {
        let fx = Fixture::new();
        fx.transport.queue_error(TransportError::Timeout);
        let mut client = fx.client();

        let stop = client.stop_handle();
        let handle = tokio::spawn(async move {
            let result = client.sync().await;
            (client, result)
        });
        fx.transport.wait_for_requests(1).await;
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        stop.stop();

        let (_client, result) = handle.await.unwrap();
        result.unwrap();
        assert_eq!(fx.transport.requests().len(), 1);
    }
}
