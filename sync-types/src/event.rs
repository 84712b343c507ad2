//! Room events as they appear in sync responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ContentError, RoomId, SyncError};

/// Event type for room membership state.
pub const MEMBER_EVENT: &str = "m.room.member";

/// Free-form JSON object carried by an event.
///
/// Accessors never panic on unexpected shapes; they return a
/// [`ContentError`] the caller can treat as "not applicable".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(Map<String, Value>);

impl Content {
    /// An empty content object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for constructing events in tests.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Look up a raw JSON value.
    pub fn get(&self, key: &str) -> Result<&Value, ContentError> {
        self.0.get(key).ok_or_else(|| ContentError::Missing {
            key: key.to_string(),
        })
    }

    /// Look up a string value.
    pub fn get_str(&self, key: &str) -> Result<&str, ContentError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| wrong_shape(key, "string"))
    }

    /// Look up a boolean value.
    pub fn get_bool(&self, key: &str) -> Result<bool, ContentError> {
        self.get(key)?
            .as_bool()
            .ok_or_else(|| wrong_shape(key, "boolean"))
    }

    /// Look up an integer value.
    pub fn get_i64(&self, key: &str) -> Result<i64, ContentError> {
        self.get(key)?
            .as_i64()
            .ok_or_else(|| wrong_shape(key, "integer"))
    }

    /// Look up a nested object.
    pub fn get_object(&self, key: &str) -> Result<&Map<String, Value>, ContentError> {
        self.get(key)?
            .as_object()
            .ok_or_else(|| wrong_shape(key, "object"))
    }

    /// Whether the object has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn wrong_shape(key: &str, expected: &'static str) -> ContentError {
    ContentError::WrongShape {
        key: key.to_string(),
        expected,
    }
}

impl From<Map<String, Value>> for Content {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Content {
    type Error = SyncError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SyncError::InvalidData(format!(
                "event content must be an object, got {}",
                other
            ))),
        }
    }
}

/// A single room event.
///
/// The presence of `state_key` distinguishes a state event from a timeline
/// (message) event. `room_id` is not sent inside sync responses; the reducer
/// stamps it from the enclosing room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `m.room.message`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// State key; `None` for timeline events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Sender user ID.
    #[serde(default)]
    pub sender: String,
    /// Server-assigned event ID.
    #[serde(default)]
    pub event_id: String,
    /// Origin server timestamp in milliseconds.
    #[serde(default, rename = "origin_server_ts")]
    pub timestamp: i64,
    /// Room the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Event payload.
    #[serde(default)]
    pub content: Content,
    /// Previous content for state events that replaced an earlier value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<Content>,
    /// Server-added metadata not covered by signatures.
    #[serde(default, skip_serializing_if = "Content::is_empty")]
    pub unsigned: Content,
    /// Event ID this event redacts, for `m.room.redaction`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacts: Option<String>,
}

impl Event {
    /// Create a timeline event.
    pub fn new(event_type: &str, content: Content) -> Self {
        Self {
            event_type: event_type.to_string(),
            state_key: None,
            sender: String::new(),
            event_id: String::new(),
            timestamp: 0,
            room_id: None,
            content,
            prev_content: None,
            unsigned: Content::new(),
            redacts: None,
        }
    }

    /// Create a state event.
    pub fn state(event_type: &str, state_key: &str, content: Content) -> Self {
        Self {
            state_key: Some(state_key.to_string()),
            ..Self::new(event_type, content)
        }
    }

    /// Set the sender.
    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = sender.to_string();
        self
    }

    /// Set the event ID.
    pub fn with_event_id(mut self, event_id: &str) -> Self {
        self.event_id = event_id.to_string();
        self
    }

    /// Whether this is a state event.
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// The `body` of a message event.
    pub fn body(&self) -> Result<&str, ContentError> {
        self.content.get_str("body")
    }

    /// The `msgtype` of a message event.
    pub fn msgtype(&self) -> Result<&str, ContentError> {
        self.content.get_str("msgtype")
    }

    /// The `membership` of an `m.room.member` event.
    pub fn membership(&self) -> Result<&str, ContentError> {
        self.content.get_str("membership")
    }
}
