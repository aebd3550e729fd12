//! The note creation dialog.
//!
//! [`NoteDialog`] is a small state machine driven by user actions. It owns the
//! form field, the dictation controller that may be filling it, and the
//! notifier used for the dictation-unsupported alert and the success notice.
//!
//! ```text
//! Closed --open--> Onboarding --use_text_only--> TextEntry
//!                      |                            ^
//!                      +--start_dictation--> Dictating --stop_dictation--+
//! ```
//!
//! `back` returns to onboarding from either entry mode, `close` discards
//! everything, and a successful `submit` closes the dialog.

use std::fmt;

use tracing::{debug, info, warn};

use crate::dictation::DictationController;
use crate::error::Result;
use crate::note::{Note, NoteContent};
use crate::notebook::Notebook;
use crate::notify::{messages, Notifier};
use crate::storage::NoteStore;

/// Screen shown while the dialog is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogView {
    /// Prompt offering text or voice entry.
    Onboarding,
    /// Free typing into the form field.
    TextEntry,
    /// The form field follows the dictation transcript.
    Dictating,
}

impl fmt::Display for DialogView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onboarding => write!(f, "onboarding"),
            Self::TextEntry => write!(f, "text entry"),
            Self::Dictating => write!(f, "dictating"),
        }
    }
}

/// Dialog state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    /// Not shown.
    #[default]
    Closed,
    /// Shown on the given screen.
    Open(DialogView),
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open(view) => write!(f, "open ({view})"),
        }
    }
}

/// Note creation dialog.
#[derive(Debug)]
pub struct NoteDialog<N: Notifier> {
    state: DialogState,
    content: String,
    dictation: DictationController,
    notifier: N,
}

impl<N: Notifier> NoteDialog<N> {
    /// Create a closed dialog.
    #[must_use]
    pub fn new(dictation: DictationController, notifier: N) -> Self {
        Self {
            state: DialogState::Closed,
            content: String::new(),
            dictation,
            notifier,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DialogState {
        self.state
    }

    /// Current form field contents.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Check if dictation is filling the form.
    #[must_use]
    pub fn is_dictating(&self) -> bool {
        self.state == DialogState::Open(DialogView::Dictating)
    }

    /// Check if the dictation session has stopped sending updates on its own.
    #[must_use]
    pub fn dictation_ended(&self) -> bool {
        self.dictation.has_ended()
    }

    /// The dictation controller.
    #[must_use]
    pub fn dictation(&self) -> &DictationController {
        &self.dictation
    }

    /// The notifier.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Show the dialog on the onboarding screen with an empty form.
    pub fn open(&mut self) {
        if let DialogState::Open(view) = self.state {
            debug!(%view, "Dialog already open");
            return;
        }
        self.content.clear();
        self.transition(DialogState::Open(DialogView::Onboarding));
    }

    /// Choose text entry from onboarding.
    pub fn use_text_only(&mut self) {
        if !self.expect_view(&[DialogView::Onboarding], "use_text_only") {
            return;
        }
        self.transition(DialogState::Open(DialogView::TextEntry));
    }

    /// Choose voice entry from onboarding.
    ///
    /// When the host cannot dictate, an alert is shown and the dialog falls
    /// back to text entry.
    pub fn start_dictation(&mut self) {
        if !self.expect_view(&[DialogView::Onboarding], "start_dictation") {
            return;
        }

        match self.dictation.start() {
            Ok(()) => self.transition(DialogState::Open(DialogView::Dictating)),
            Err(e) => {
                if e.is_unsupported() {
                    info!("Dictation unsupported, falling back to text entry");
                } else {
                    warn!(error = %e, "Dictation failed to start, falling back to text entry");
                }
                self.notifier.alert(messages::DICTATION_UNSUPPORTED);
                self.transition(DialogState::Open(DialogView::TextEntry));
            }
        }
    }

    /// Replace the form field with typed text.
    pub fn set_content(&mut self, text: impl Into<String>) {
        if !self.expect_view(&[DialogView::TextEntry, DialogView::Dictating], "set_content") {
            return;
        }
        self.content = text.into();
    }

    /// Copy the latest dictation transcript into the form field.
    ///
    /// Returns `true` if the field changed.
    pub fn pump(&mut self) -> bool {
        if !self.is_dictating() {
            return false;
        }
        match self.dictation.poll() {
            Some(transcript) if transcript != self.content => {
                self.content = transcript;
                true
            }
            _ => false,
        }
    }

    /// Stop dictating and keep the transcript for editing.
    pub fn stop_dictation(&mut self) {
        if !self.expect_view(&[DialogView::Dictating], "stop_dictation") {
            return;
        }
        self.finish_dictation();
        self.transition(DialogState::Open(DialogView::TextEntry));
    }

    /// Return to onboarding, discarding the form.
    pub fn back(&mut self) {
        if !self.expect_view(&[DialogView::TextEntry, DialogView::Dictating], "back") {
            return;
        }
        self.dictation.stop();
        self.content.clear();
        self.transition(DialogState::Open(DialogView::Onboarding));
    }

    /// Save the form as a new note.
    ///
    /// Any active dictation is stopped first and its last transcript
    /// applied. Blank content is ignored and leaves the dialog open with the
    /// field as it was. On success the dialog closes, the field is cleared
    /// and a success notice is shown.
    ///
    /// # Errors
    ///
    /// Returns an error if the note cannot be persisted. The dialog stays
    /// open with its content intact.
    pub fn submit<S: NoteStore>(&mut self, notebook: &mut Notebook<S>) -> Result<Option<Note>> {
        let DialogState::Open(view) = self.state else {
            debug!("Submit ignored while closed");
            return Ok(None);
        };

        if view == DialogView::Dictating {
            self.finish_dictation();
            self.transition(DialogState::Open(DialogView::TextEntry));
        }

        let Some(content) = NoteContent::parse(self.content.clone()) else {
            debug!("Submit ignored, content is blank");
            return Ok(None);
        };

        let note = notebook.create(content)?;
        self.content.clear();
        self.transition(DialogState::Closed);
        self.notifier.success(messages::NOTE_CREATED);
        Ok(Some(note))
    }

    /// Dismiss the dialog without saving.
    pub fn close(&mut self) {
        if self.state == DialogState::Closed {
            debug!("Dialog already closed");
            return;
        }
        self.dictation.stop();
        self.content.clear();
        self.transition(DialogState::Closed);
    }

    fn finish_dictation(&mut self) {
        if let Some(transcript) = self.dictation.poll() {
            self.content = transcript;
        }
        self.dictation.stop();
    }

    fn expect_view(&self, allowed: &[DialogView], action: &'static str) -> bool {
        match self.state {
            DialogState::Open(view) if allowed.contains(&view) => true,
            state => {
                debug!(action, %state, "Action ignored in current state");
                false
            }
        }
    }

    fn transition(&mut self, next: DialogState) {
        debug!(from = %self.state, to = %next, "Dialog transition");
        self.state = next;
    }
}
