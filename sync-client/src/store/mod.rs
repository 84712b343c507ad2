//! Persistence for resumption tokens and filter IDs.
//!
//! Stores are keyed by user ID. Saving is fire-and-forget: a store that
//! cannot write logs the failure and carries on, so a broken disk never
//! stops the poll loop.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryCursorStore, MemoryFilterStore};

use roomsync_types::{Cursor, FilterDefinition, FilterId, UserId};

/// Saves and loads the resumption token per user.
pub trait CursorStore: Send + Sync {
    /// Record the token to resume from.
    fn save_cursor(&self, user_id: &UserId, cursor: &Cursor);

    /// The last saved token, or [`Cursor::initial`] if none.
    fn load_cursor(&self, user_id: &UserId) -> Cursor;
}

/// Saves and loads the server-side filter ID per user.
pub trait FilterStore: Send + Sync {
    /// Record the ID the server assigned to this user's filter.
    fn save_filter_id(&self, user_id: &UserId, filter_id: &FilterId);

    /// The saved filter ID, if any.
    fn load_filter_id(&self, user_id: &UserId) -> Option<FilterId>;

    /// The definition to upload when no filter ID is saved.
    fn filter_definition(&self) -> FilterDefinition {
        FilterDefinition::default()
    }
}
