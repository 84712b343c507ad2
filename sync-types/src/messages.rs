//! Sync protocol messages.
//!
//! [`SyncRequest`] is what the client asks for; [`SyncResponse`] is the
//! incremental delta the server returns. Responses are consumed once by the
//! reducer and never retained.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Cursor, Event, FilterId, RoomId, SyncError};

/// Default long-poll timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Parameters of one long-poll fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Resume point; initial on the very first sync.
    pub since: Cursor,
    /// Server-side filter to apply.
    pub filter: Option<FilterId>,
    /// How long the server may hold the request open.
    pub timeout_ms: u64,
    /// Ask for full state even when `since` is set.
    pub full_state: bool,
    /// Presence to set while syncing (`online`, `offline`, `unavailable`).
    pub set_presence: Option<String>,
}

impl SyncRequest {
    /// Request everything after `since` with default parameters.
    pub fn new(since: Cursor) -> Self {
        Self {
            since,
            filter: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            full_state: false,
            set_presence: None,
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FilterId) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// An incremental sync response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Token to pass as `since` on the next fetch.
    pub next_batch: Cursor,
    /// Per-room deltas.
    #[serde(default)]
    pub rooms: Rooms,
    /// Global account data events.
    #[serde(default)]
    pub account_data: EventList,
    /// Presence events.
    #[serde(default)]
    pub presence: EventList,
}

impl SyncResponse {
    /// Create an empty response carrying the given next-batch token.
    pub fn new(next_batch: impl Into<String>) -> Self {
        Self {
            next_batch: Cursor::new(next_batch),
            ..Self::default()
        }
    }

    /// Add (or replace) a joined room.
    pub fn with_joined_room(mut self, room_id: &str, room: JoinedRoom) -> Self {
        self.rooms.join.insert(RoomId::new(room_id), room);
        self
    }

    /// Add (or replace) an invited room.
    pub fn with_invited_room(mut self, room_id: &str, room: InvitedRoom) -> Self {
        self.rooms.invite.insert(RoomId::new(room_id), room);
        self
    }

    /// Decode from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::Deserialization)
    }

    /// Encode to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Serialization)
    }
}

/// Rooms section of a sync response, keyed by room ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rooms {
    /// Rooms the account has joined.
    #[serde(default)]
    pub join: BTreeMap<RoomId, JoinedRoom>,
    /// Rooms the account has been invited to.
    #[serde(default)]
    pub invite: BTreeMap<RoomId, InvitedRoom>,
    /// Rooms the account has left.
    #[serde(default)]
    pub leave: BTreeMap<RoomId, LeftRoom>,
}

/// A list of events, as wrapped on the wire (`{"events": [...]}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    /// The events, oldest first.
    #[serde(default)]
    pub events: Vec<Event>,
}

impl From<Vec<Event>> for EventList {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

/// Timeline section of a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Timeline events, oldest first.
    #[serde(default)]
    pub events: Vec<Event>,
    /// True when the server truncated the timeline.
    #[serde(default)]
    pub limited: bool,
    /// Token for paginating backwards from the start of this timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_batch: Option<String>,
}

/// Delta for a joined room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinedRoom {
    /// State events preceding the timeline.
    #[serde(default)]
    pub state: EventList,
    /// New timeline events.
    #[serde(default)]
    pub timeline: Timeline,
}

impl JoinedRoom {
    /// Build a joined room from state and timeline events.
    pub fn new(state: Vec<Event>, timeline: Vec<Event>) -> Self {
        Self {
            state: state.into(),
            timeline: Timeline {
                events: timeline,
                ..Timeline::default()
            },
        }
    }
}

/// Delta for an invited room (stripped state only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvitedRoom {
    /// Stripped state describing the invite.
    #[serde(default)]
    pub invite_state: EventList,
}

impl InvitedRoom {
    /// Build an invited room from stripped state events.
    pub fn new(invite_state: Vec<Event>) -> Self {
        Self {
            invite_state: invite_state.into(),
        }
    }
}

/// Delta for a left room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeftRoom {
    /// State at the time of leaving.
    #[serde(default)]
    pub state: EventList,
    /// Timeline up to the leave.
    #[serde(default)]
    pub timeline: Timeline,
}

/// A filter body to upload when no filter ID is cached yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterDefinition(serde_json::Value);

impl FilterDefinition {
    /// Wrap a JSON filter document.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the JSON document.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Response to a filter upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResponse {
    /// Identifier assigned by the server.
    pub filter_id: FilterId,
}
