//! Room state table.
//!
//! Each [`Room`] holds the latest state event per `(type, state_key)` pair.
//! The [`RoomTable`] is owned by a single reducer and is only ever touched
//! through `&mut`, so it needs no locking.

use roomsync_types::{Event, RoomId, MEMBER_EVENT};
use std::collections::HashMap;
use thiserror::Error;

/// Membership reported when no member event exists for a user.
pub const DEFAULT_MEMBERSHIP: &str = "leave";

/// Errors from merging state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A timeline event was handed to the state merge.
    #[error("event {event_type} in room {room_id} has no state key")]
    MissingStateKey {
        /// The offending event type.
        event_type: String,
        /// The room being updated.
        room_id: RoomId,
    },
}

/// Local view of a single room.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    /// Latest state event keyed by `(event_type, state_key)`.
    state: HashMap<(String, String), Event>,
}

impl Room {
    /// Create an empty room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            state: HashMap::new(),
        }
    }

    /// The room identifier.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Merge one state event, replacing any earlier event with the same
    /// `(type, state_key)`.
    pub fn update_state(&mut self, event: Event) -> Result<(), StateError> {
        let state_key = event
            .state_key
            .clone()
            .ok_or_else(|| StateError::MissingStateKey {
                event_type: event.event_type.clone(),
                room_id: self.id.clone(),
            })?;
        self.state
            .insert((event.event_type.clone(), state_key), event);
        Ok(())
    }

    /// Get the current state event for a `(type, state_key)` pair.
    pub fn state_event(&self, event_type: &str, state_key: &str) -> Option<&Event> {
        self.state
            .get(&(event_type.to_string(), state_key.to_string()))
    }

    /// Membership of `user_id` in this room.
    ///
    /// Returns [`DEFAULT_MEMBERSHIP`] when there is no member event or its
    /// content is malformed.
    pub fn membership_state(&self, user_id: &str) -> &str {
        self.state_event(MEMBER_EVENT, user_id)
            .and_then(|event| event.membership().ok())
            .unwrap_or(DEFAULT_MEMBERSHIP)
    }

    /// Number of distinct state entries.
    pub fn state_len(&self) -> usize {
        self.state.len()
    }

    /// Iterate over all current state events.
    pub fn state_events(&self) -> impl Iterator<Item = &Event> {
        self.state.values()
    }
}

/// All rooms known to one syncer.
#[derive(Debug, Clone, Default)]
pub struct RoomTable {
    rooms: HashMap<RoomId, Room>,
}

impl RoomTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a room, inserting an empty one on first reference.
    pub fn get_or_create(&mut self, room_id: &RoomId) -> &mut Room {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()))
    }

    /// Look up a room without creating it.
    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Iterate over all rooms in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}
