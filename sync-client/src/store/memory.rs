//! In-memory stores. Nothing survives a restart.

use roomsync_types::{Cursor, FilterDefinition, FilterId, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{CursorStore, FilterStore};

/// Cursor store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<UserId, Cursor>>,
}

impl MemoryCursorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn save_cursor(&self, user_id: &UserId, cursor: &Cursor) {
        self.cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.clone(), cursor.clone());
    }

    fn load_cursor(&self, user_id: &UserId) -> Cursor {
        self.cursors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Filter store backed by a map, with a fixed definition to upload.
#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    filters: Mutex<HashMap<UserId, FilterId>>,
    definition: FilterDefinition,
}

impl MemoryFilterStore {
    /// Create an empty store that uploads the empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that uploads `definition`.
    pub fn with_definition(definition: FilterDefinition) -> Self {
        Self {
            filters: Mutex::default(),
            definition,
        }
    }
}

impl FilterStore for MemoryFilterStore {
    fn save_filter_id(&self, user_id: &UserId, filter_id: &FilterId) {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.clone(), filter_id.clone());
    }

    fn load_filter_id(&self, user_id: &UserId) -> Option<FilterId> {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn filter_definition(&self) -> FilterDefinition {
        self.definition.clone()
    }
}
