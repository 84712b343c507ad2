//! Sync response reducer.
//!
//! Applies one incremental [`SyncResponse`] to the [`RoomTable`] and
//! dispatches every admitted event to the [`ListenerRegistry`].
//!
//! # Replay suppression
//!
//! Right after the account (re)joins a room the server returns that room's
//! recent backlog. Those events are not new activity, so before anything is
//! merged the reducer looks at each joined room's timeline from newest to
//! oldest for our own `m.room.member` event. The first one carrying a string
//! membership decides; if it is `join`, the room is dropped from both the
//! joined and invited sections of the response.
//!
//! # Fault boundary
//!
//! Merge errors, listener errors and listener panics all end up as a single
//! [`ReduceError`] carrying the user and cursor. The rest of the response is
//! abandoned; the caller is expected to stop polling.

use roomsync_types::{Cursor, Event, RoomId, Rooms, SyncResponse, UserId, MEMBER_EVENT};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::listeners::{EventListener, ListenerError, ListenerRegistry};
use crate::rooms::{RoomTable, StateError};

/// Membership value that marks a freshly (re)joined room.
const JOIN: &str = "join";

/// What went wrong inside the reduce boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceFault {
    /// Merging a state event failed.
    #[error("state merge failed: {0}")]
    State(#[from] StateError),

    /// A listener returned an error.
    #[error("listener for {event_type} failed: {source}")]
    Listener {
        /// Type of the event being dispatched.
        event_type: String,
        /// The listener's error.
        #[source]
        source: ListenerError,
    },

    /// A listener (or the reducer itself) panicked.
    #[error("panicked: {0}")]
    Panic(String),
}

/// A response could not be reduced. Fatal to the poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to process sync response for {user_id} since {since:?}: {fault}")]
pub struct ReduceError {
    /// Account being synced.
    pub user_id: UserId,
    /// Cursor the failing response was fetched with.
    pub since: Cursor,
    /// Underlying fault.
    #[source]
    pub fault: ReduceFault,
}

/// Reduces sync responses into room state and listener callbacks.
///
/// One reducer per syncing account; it owns its room table, so two
/// reducers never share state.
#[derive(Debug)]
pub struct ResponseReducer {
    user_id: UserId,
    rooms: RoomTable,
    listeners: ListenerRegistry,
}

impl ResponseReducer {
    /// Create a reducer for `user_id` with no rooms and no listeners.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            rooms: RoomTable::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    /// The account this reducer filters self-membership for.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Read access to the room table.
    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    /// Read access to the listener registry.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Register a listener for `event_type`.
    pub fn subscribe(&mut self, event_type: &str, listener: Arc<dyn EventListener>) {
        self.listeners.subscribe(event_type, listener);
    }

    /// Register a closure for `event_type`.
    pub fn on_event_type<F>(&mut self, event_type: &str, callback: F)
    where
        F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.subscribe(event_type, Arc::new(callback));
    }

    /// Apply one response fetched with cursor `since`.
    ///
    /// A response fetched with the initial cursor is a full snapshot and is
    /// discarded without touching state or listeners.
    pub fn process_response(
        &mut self,
        mut response: SyncResponse,
        since: &Cursor,
    ) -> Result<(), ReduceError> {
        if since.is_initial() {
            tracing::debug!("Skipping initial sync snapshot for {}", self.user_id);
            return Ok(());
        }

        for room_id in rejoined_rooms(&response, &self.user_id) {
            tracing::debug!("Suppressing backlog of rejoined room {}", room_id);
            response.rooms.join.remove(&room_id);
            response.rooms.invite.remove(&room_id);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.apply(response.rooms)));
        let fault = match outcome {
            Ok(Ok(dispatched)) => {
                tracing::debug!("Reduced response since {:?}: {} events", since, dispatched);
                return Ok(());
            }
            Ok(Err(fault)) => fault,
            Err(payload) => ReduceFault::Panic(panic_message(payload.as_ref())),
        };

        tracing::error!(
            "Failed to process response for {} since {:?}: {}",
            self.user_id,
            since,
            fault
        );
        Err(ReduceError {
            user_id: self.user_id.clone(),
            since: since.clone(),
            fault,
        })
    }

    /// Merge and dispatch; returns the number of events dispatched.
    fn apply(&mut self, rooms: Rooms) -> Result<usize, ReduceFault> {
        let mut dispatched = 0;

        for (room_id, joined) in rooms.join {
            let room = self.rooms.get_or_create(&room_id);
            for event in joined.state.events {
                let event = stamp(event, &room_id);
                room.update_state(event.clone())?;
                dispatch(&self.listeners, &event)?;
                dispatched += 1;
            }
            for event in joined.timeline.events {
                let event = stamp(event, &room_id);
                dispatch(&self.listeners, &event)?;
                dispatched += 1;
            }
        }

        for (room_id, invited) in rooms.invite {
            let room = self.rooms.get_or_create(&room_id);
            for event in invited.invite_state.events {
                let event = stamp(event, &room_id);
                room.update_state(event.clone())?;
                dispatch(&self.listeners, &event)?;
                dispatched += 1;
            }
        }

        Ok(dispatched)
    }
}

/// Joined rooms whose newest own membership event in the timeline is `join`.
fn rejoined_rooms(response: &SyncResponse, user_id: &UserId) -> Vec<RoomId> {
    response
        .rooms
        .join
        .iter()
        .filter(|(_, room)| latest_own_membership(&room.timeline.events, user_id) == Some(JOIN))
        .map(|(room_id, _)| room_id.clone())
        .collect()
}

/// Scan newest to oldest and stop at the first own member event with a
/// string membership. Malformed membership content is skipped.
fn latest_own_membership<'a>(events: &'a [Event], user_id: &UserId) -> Option<&'a str> {
    events
        .iter()
        .rev()
        .filter(|event| {
            event.event_type == MEMBER_EVENT
                && event.state_key.as_deref() == Some(user_id.as_str())
        })
        .find_map(|event| event.membership().ok())
}

fn stamp(mut event: Event, room_id: &RoomId) -> Event {
    event.room_id = Some(room_id.clone());
    event
}

fn dispatch(listeners: &ListenerRegistry, event: &Event) -> Result<(), ReduceFault> {
    listeners
        .dispatch(event)
        .map_err(|source| ReduceFault::Listener {
            event_type: event.event_type.clone(),
            source,
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
