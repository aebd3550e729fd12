//! Core note types for notecards.
//!
//! A [`Note`] is the only entity the application stores. Notes are flat,
//! independent records: an identifier, a creation timestamp and the text.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Text accepted by the note creation form.
///
/// Holding a `NoteContent` proves the text is not empty or whitespace-only,
/// which is the only precondition a new note has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteContent(String);

impl NoteContent {
    /// Validate form text, returning `None` when there is nothing to save.
    #[must_use]
    pub fn parse(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    /// Borrow the validated text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the validated text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A user-authored note.
///
/// Serializes to `{"id", "date", "content"}`, the layout of the persisted
/// collection. New notes get a UUID id; ids written by other tools are kept
/// as they are. `date` is written as RFC 3339 and also read from epoch
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, assigned at creation.
    pub id: String,

    /// When the note was created.
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,

    /// The note text.
    pub content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Millis(i64),
    Text(String),
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDate::deserialize(deserializer)? {
        RawDate::Millis(millis) => DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {millis}"))),
        RawDate::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|date| date.with_timezone(&Utc))
            .map_err(de::Error::custom),
    }
}

impl Note {
    /// Create a new note with a fresh identifier, stamped with the current time.
    #[must_use]
    pub fn new(content: NoteContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date: Utc::now(),
            content: content.into_inner(),
        }
    }

    /// Check whether the note text contains `needle`, where `needle` is
    /// already lowercased.
    #[must_use]
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        self.content.to_lowercase().contains(needle)
    }
}
