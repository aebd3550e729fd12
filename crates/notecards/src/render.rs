//! Note list rendering.

use std::fmt::Write as _;

use chrono::Local;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::note::Note;

/// Timestamp layout shown on note cards.
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Line shown in plain mode when there is nothing to list.
pub const EMPTY_LIST: &str = "No notes.";

/// Render `notes` in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_notes(notes: &[Note], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(notes)?),
        OutputFormat::Plain if notes.is_empty() => Ok(EMPTY_LIST.to_string()),
        OutputFormat::Plain => Ok(notes
            .iter()
            .map(render_card)
            .collect::<Vec<_>>()
            .join("\n\n")),
    }
}

/// Render a single note as a card: local timestamp, content, id.
#[must_use]
pub fn render_card(note: &Note) -> String {
    let mut card = String::new();
    let _ = writeln!(card, "{}", local_date(note));
    let _ = writeln!(card, "{}", note.content);
    let _ = write!(card, "id: {}", note.id);
    card
}

/// Creation time in the local timezone, formatted for display.
#[must_use]
pub fn local_date(note: &Note) -> String {
    note.date.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteContent;

    fn note(text: &str) -> Note {
        Note::new(NoteContent::parse(text).unwrap())
    }

    #[test]
    fn test_empty_plain() {
        assert_eq!(render_notes(&[], OutputFormat::Plain).unwrap(), EMPTY_LIST);
    }

    #[test]
    fn test_empty_json() {
        assert_eq!(render_notes(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_card_layout() {
        let note = note("Buy milk");
        let card = render_card(&note);
        let lines: Vec<&str> = card.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], local_date(&note));
        assert_eq!(lines[1], "Buy milk");
        assert_eq!(lines[2], format!("id: {}", note.id));
    }

    #[test]
    fn test_plain_keeps_order() {
        let notes = vec![note("newest"), note("oldest")];
        let out = render_notes(&notes, OutputFormat::Plain).unwrap();

        let newest = out.find("newest").unwrap();
        let oldest = out.find("oldest").unwrap();
        assert!(newest < oldest);
        assert_eq!(out.matches("id: ").count(), 2);
    }

    #[test]
    fn test_json_matches_persisted_layout() {
        let notes = vec![note("a"), note("b")];
        let out = render_notes(&notes, OutputFormat::Json).unwrap();

        let parsed: Vec<Note> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, notes);
    }

    #[test]
    fn test_local_date_format() {
        let note = note("x");
        let date = local_date(&note);
        // dd/mm/yyyy hh:mm
        assert_eq!(date.len(), 16);
        assert_eq!(&date[2..3], "/");
        assert_eq!(&date[5..6], "/");
        assert_eq!(&date[13..14], ":");
    }
}
