//! `notecards` - Quick text and dictated notes, kept in a local store
//!
//! This library provides the note collection and its persistence, the search
//! filter, the note creation dialog, and the dictation controller that feeds
//! it from a host speech recognizer.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod dialog;
pub mod dictation;
pub mod error;
pub mod logging;
pub mod note;
pub mod notebook;
pub mod notify;
pub mod render;
pub mod search;
pub mod storage;

pub use config::Config;
pub use dialog::{DialogState, DialogView, NoteDialog};
pub use dictation::DictationController;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use note::{Note, NoteContent};
pub use notebook::Notebook;
pub use notify::{ConsoleNotifier, Notifier};
pub use storage::{LocalNoteStore, NoteStore};
