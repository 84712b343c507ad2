//! JSON file store for cursors and filter IDs.
//!
//! The whole document is rewritten on every save by writing a sibling
//! temp file and renaming it over the existing one.

use roomsync_types::{Cursor, FilterDefinition, FilterId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{CursorStore, FilterStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    cursors: BTreeMap<UserId, Cursor>,
    #[serde(default)]
    filters: BTreeMap<UserId, FilterId>,
}

/// Cursor and filter store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<Document>,
    definition: FilterDefinition,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing or unreadable file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt sync store {}: {}", path.display(), e);
                Document::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => {
                tracing::warn!("Failed to read sync store {}: {}", path.display(), e);
                Document::default()
            }
        };
        Self {
            path,
            doc: Mutex::new(doc),
            definition: FilterDefinition::default(),
        }
    }

    /// Upload `definition` when no filter ID is saved.
    pub fn with_definition(mut self, definition: FilterDefinition) -> Self {
        self.definition = definition;
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, apply: impl FnOnce(&mut Document)) {
        let mut doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut doc);
        if let Err(e) = self.write(&doc) {
            tracing::warn!("Failed to write sync store {}: {}", self.path.display(), e);
        }
    }

    fn write(&self, doc: &Document) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl CursorStore for FileStore {
    fn save_cursor(&self, user_id: &UserId, cursor: &Cursor) {
        self.update(|doc| {
            doc.cursors.insert(user_id.clone(), cursor.clone());
        });
    }

    fn load_cursor(&self, user_id: &UserId) -> Cursor {
        let doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        doc.cursors.get(user_id).cloned().unwrap_or_default()
    }
}

impl FilterStore for FileStore {
    fn save_filter_id(&self, user_id: &UserId, filter_id: &FilterId) {
        self.update(|doc| {
            doc.filters.insert(user_id.clone(), filter_id.clone());
        });
    }

    fn load_filter_id(&self, user_id: &UserId) -> Option<FilterId> {
        let doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        doc.filters.get(user_id).cloned()
    }

    fn filter_definition(&self) -> FilterDefinition {
        self.definition.clone()
    }
}
