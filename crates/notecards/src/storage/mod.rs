//! Storage layer for notecards.
//!
//! The note collection lives under a single key of a [`KeyValueStore`],
//! serialized as one JSON array. Three backends are provided:
//! - [`FileKeyValueStore`]: one file per key, replaced atomically on write
//! - [`SqliteKeyValueStore`]: a key/value table in a `SQLite` database
//! - [`MemoryKeyValueStore`]: a plain map, for ephemeral sessions and tests
//!
//! [`LocalNoteStore`] sits on top of any backend and implements [`NoteStore`],
//! the load/save repository the rest of the crate talks to.

pub mod file;
pub mod memory;
pub mod schema;
pub mod sqlite;

use std::fmt;

use tracing::{debug, warn};

use crate::config::{Config, StorageBackend};
use crate::error::{Error, Result};
use crate::note::Note;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

/// Default key holding the serialized note collection.
pub const DEFAULT_NOTES_KEY: &str = "notes";

/// Check that `key` can name a file directly inside a store directory.
///
/// Keys must be non-empty, must not start with `.` and must not contain path
/// separators or NUL.
///
/// # Errors
///
/// Returns [`Error::InvalidKey`] otherwise.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// String-keyed persistence, modeled on browser local storage.
pub trait KeyValueStore: Send {
    /// Short backend name (for logging and status output).
    fn name(&self) -> &'static str;

    /// Human-readable location of the backing data.
    fn location(&self) -> String;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

/// Repository for the full note collection.
pub trait NoteStore {
    /// Load every persisted note, newest first.
    ///
    /// A missing or malformed collection loads as empty, and records that do
    /// not decode are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read. Callers must not
    /// write over a collection they failed to load.
    fn load(&self) -> Result<Vec<Note>>;

    /// Overwrite the persisted collection with `notes`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    fn save(&mut self, notes: &[Note]) -> Result<()>;
}

/// A [`NoteStore`] keeping the collection as JSON under one key.
pub struct LocalNoteStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl fmt::Debug for LocalNoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalNoteStore")
            .field("backend", &self.backend.name())
            .field("location", &self.backend.location())
            .field("key", &self.key)
            .finish()
    }
}

impl LocalNoteStore {
    /// Wrap a backend, storing notes under `key`.
    #[must_use]
    pub fn new(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Open the backend selected by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Box<dyn KeyValueStore> = match config.storage.backend {
            StorageBackend::File => Box::new(FileKeyValueStore::open(config.data_dir())?),
            StorageBackend::Sqlite => Box::new(SqliteKeyValueStore::open(config.database_path())?),
            StorageBackend::Memory => Box::new(MemoryKeyValueStore::new()),
        };
        Ok(Self::new(backend, config.storage.key.clone()))
    }

    /// The key holding the collection.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Borrow the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }
}

impl NoteStore for LocalNoteStore {
    fn load(&self) -> Result<Vec<Note>> {
        let Some(raw) = self.backend.get_item(&self.key)? else {
            debug!(key = %self.key, "No persisted notes");
            return Ok(Vec::new());
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Persisted notes are malformed, ignoring");
                return Ok(Vec::new());
            }
        };

        let total = records.len();
        let notes: Vec<Note> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value(record) {
                Ok(note) => Some(note),
                Err(e) => {
                    warn!(key = %self.key, index, error = %e, "Skipping malformed note");
                    None
                }
            })
            .collect();

        debug!(key = %self.key, count = notes.len(), skipped = total - notes.len(), "Loaded notes");
        Ok(notes)
    }

    fn save(&mut self, notes: &[Note]) -> Result<()> {
        let serialized = serde_json::to_string(notes)?;
        self.backend.set_item(&self.key, &serialized)?;
        debug!(key = %self.key, count = notes.len(), "Saved notes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteContent;

    /// A backend whose reads always fail.
    #[derive(Debug)]
    struct UnreadableStore;

    impl KeyValueStore for UnreadableStore {
        fn name(&self) -> &'static str {
            "unreadable"
        }

        fn location(&self) -> String {
            "nowhere".to_string()
        }

        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )))
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }

        fn remove_item(&mut self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn memory_store() -> LocalNoteStore {
        LocalNoteStore::new(Box::new(MemoryKeyValueStore::new()), DEFAULT_NOTES_KEY)
    }

    fn note(content: &str) -> Note {
        Note::new(NoteContent::parse(content).unwrap())
    }

    #[test]
    fn test_load_missing_is_empty() {
        let store = memory_store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let mut store = memory_store();
        let notes = vec![note("newest"), note("middle"), note("oldest")];

        store.save(&notes).unwrap();
        assert_eq!(store.load().unwrap(), notes);
    }

    #[test]
    fn test_save_overwrites() {
        let mut store = memory_store();
        store.save(&[note("one"), note("two")]).unwrap();

        let replacement = vec![note("only")];
        store.save(&replacement).unwrap();
        assert_eq!(store.load().unwrap(), replacement);
    }

    #[test]
    fn test_malformed_is_empty() {
        let mut backend = MemoryKeyValueStore::new();
        backend.set_item(DEFAULT_NOTES_KEY, "{not json").unwrap();
        let store = LocalNoteStore::new(Box::new(backend), DEFAULT_NOTES_KEY);

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_shape_is_empty() {
        let mut backend = MemoryKeyValueStore::new();
        backend
            .set_item(DEFAULT_NOTES_KEY, r#"{"id": "x", "content": "y"}"#)
            .unwrap();
        let store = LocalNoteStore::new(Box::new(backend), DEFAULT_NOTES_KEY);

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_blank_value_is_empty() {
        let mut backend = MemoryKeyValueStore::new();
        backend.set_item(DEFAULT_NOTES_KEY, "  ").unwrap();
        let store = LocalNoteStore::new(Box::new(backend), DEFAULT_NOTES_KEY);

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_persisted_layout() {
        let mut store = memory_store();
        store.save(&[note("Buy milk")]).unwrap();

        let raw = store.backend().get_item("notes").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 1);

        let first = records[0].as_object().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first["content"], "Buy milk");
        assert!(first["id"].is_string());
        assert!(first["date"].is_string());
    }

    #[test]
    fn test_load_keeps_foreign_records() {
        let mut backend = MemoryKeyValueStore::new();
        backend
            .set_item(
                DEFAULT_NOTES_KEY,
                r#"[
                    {"id": "1708000000000-a", "date": "2024-02-15T12:26:40.000Z", "content": "first"},
                    {"id": "0b6f3c1e-8a51-4c47-9d55-3f0f2d1a9e10", "date": 1706788800000, "content": "second"}
                ]"#,
            )
            .unwrap();
        let store = LocalNoteStore::new(Box::new(backend), DEFAULT_NOTES_KEY);

        let notes = store.load().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, "1708000000000-a");
        assert_eq!(notes[1].content, "second");
    }

    #[test]
    fn test_load_skips_only_bad_records() {
        let mut backend = MemoryKeyValueStore::new();
        backend
            .set_item(
                DEFAULT_NOTES_KEY,
                r#"[
                    {"id": "a", "date": "2024-02-01T12:00:00Z", "content": "kept"},
                    {"id": "b", "content": "no date"},
                    "not a note"
                ]"#,
            )
            .unwrap();
        let store = LocalNoteStore::new(Box::new(backend), DEFAULT_NOTES_KEY);

        let notes = store.load().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "kept");
    }

    #[test]
    fn test_read_failure_is_an_error() {
        let store = LocalNoteStore::new(Box::new(UnreadableStore), DEFAULT_NOTES_KEY);
        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("notes").is_ok());
        assert!(validate_key("my-notes_2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(".notes").is_err());
        assert!(validate_key("../notes").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[test]
    fn test_custom_key() {
        let mut store = LocalNoteStore::new(Box::new(MemoryKeyValueStore::new()), "scratch");
        store.save(&[note("x")]).unwrap();

        assert_eq!(store.key(), "scratch");
        assert!(store.backend().get_item("scratch").unwrap().is_some());
        assert!(store.backend().get_item("notes").unwrap().is_none());
    }

    #[test]
    fn test_debug_names_backend() {
        let store = memory_store();
        let debug_str = format!("{store:?}");
        assert!(debug_str.contains("memory"));
        assert!(debug_str.contains("notes"));
    }
}
