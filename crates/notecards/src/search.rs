//! Search filter over the in-memory note list.

use crate::note::Note;

/// Filter notes by a case-insensitive substring of their content.
///
/// An empty query returns every note. Matching notes keep their original
/// order. Nothing is indexed; the filter is recomputed on each call.
#[must_use]
pub fn filter(notes: &[Note], query: &str) -> Vec<Note> {
    if query.is_empty() {
        return notes.to_vec();
    }

    let needle = query.to_lowercase();
    notes
        .iter()
        .filter(|note| note.matches_lowercase(&needle))
        .cloned()
        .collect()
}
