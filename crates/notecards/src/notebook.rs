//! The in-memory note collection and its persistence.
//!
//! [`Notebook`] is the only writer of the note store. Every mutation builds
//! the next collection, persists it, and only then replaces the in-memory
//! list, so memory and storage never disagree.

use tracing::{debug, info};

use crate::error::Result;
use crate::note::{Note, NoteContent};
use crate::search;
use crate::storage::NoteStore;

/// Notes held in memory, newest first, mirrored to a [`NoteStore`].
#[derive(Debug)]
pub struct Notebook<S: NoteStore> {
    store: S,
    notes: Vec<Note>,
}

impl<S: NoteStore> Notebook<S> {
    /// Load the persisted collection from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. No notebook exists in
    /// that case, so nothing can overwrite the unread collection.
    pub fn open(store: S) -> Result<Self> {
        let notes = store.load()?;
        debug!(count = notes.len(), "Notebook opened");
        Ok(Self { store, notes })
    }

    /// All notes, newest first.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Number of notes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Check if there are no notes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Look up a note by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    /// Notes whose content contains `query`, ignoring case.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Note> {
        search::filter(&self.notes, query)
    }

    /// Borrow the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a note from `content` and put it at the head of the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated collection cannot be persisted; the
    /// notebook is left unchanged in that case.
    pub fn create(&mut self, content: NoteContent) -> Result<Note> {
        let note = Note::new(content);

        let mut next = Vec::with_capacity(self.notes.len() + 1);
        next.push(note.clone());
        next.extend(self.notes.iter().cloned());

        self.store.save(&next)?;
        self.notes = next;

        info!(id = %note.id, "Note created");
        Ok(note)
    }

    /// Delete the note with `id`.
    ///
    /// Returns `false`, without writing, if no such note exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated collection cannot be persisted; the
    /// notebook is left unchanged in that case.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            debug!(id, "No note to delete");
            return Ok(false);
        }

        let next: Vec<Note> = self
            .notes
            .iter()
            .filter(|note| note.id != id)
            .cloned()
            .collect();

        self.store.save(&next)?;
        self.notes = next;

        info!(id, "Note deleted");
        Ok(true)
    }
}
