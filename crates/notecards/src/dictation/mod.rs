//! Dictation: speech-to-text capture feeding the note form.
//!
//! The host's speech recognition is reached through the [`SpeechRecognizer`]
//! trait, so the dialog logic never depends on a real environment. A
//! recognizer reports whether it is available; starting one yields a
//! [`RecognitionSession`] and a stream of [`RecognitionEvent`]s delivered
//! over an unbounded channel from whatever thread the recognizer uses.
//!
//! [`DictationController`] owns one recognizer and at most one session. It
//! turns the event stream into the full transcript recognized so far.

mod command;

use std::fmt;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, error, info, trace, warn};

use crate::config::DictationConfig;
use crate::error::{Error, Result};

pub use command::CommandRecognizer;

#[cfg(test)]
pub(crate) mod testing;

/// Name of the capability reported when no recognizer is usable.
pub const SPEECH_RECOGNITION: &str = "speech recognition";

/// Spoken language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// How a recognition session should listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// BCP 47 language tag.
    pub language: String,
    /// Keep listening across pauses.
    pub continuous: bool,
    /// Emit results before they are final.
    pub interim_results: bool,
    /// Alternatives requested per result.
    pub max_alternatives: u32,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

/// One candidate transcription of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAlternative {
    /// The recognized text, including any leading space the recognizer
    /// uses to separate it from the previous result.
    pub transcript: String,
    /// Recognizer confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// One recognized segment of speech.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Candidates, best first.
    pub alternatives: Vec<RecognitionAlternative>,
    /// Whether the recognizer will still revise this segment.
    pub is_final: bool,
}

impl RecognitionResult {
    /// A final result with a single alternative.
    #[must_use]
    pub fn final_text(transcript: impl Into<String>) -> Self {
        Self::single(transcript, true)
    }

    /// An interim result with a single alternative.
    #[must_use]
    pub fn interim_text(transcript: impl Into<String>) -> Self {
        Self::single(transcript, false)
    }

    fn single(transcript: impl Into<String>, is_final: bool) -> Self {
        Self {
            alternatives: vec![RecognitionAlternative {
                transcript: transcript.into(),
                confidence: 1.0,
            }],
            is_final,
        }
    }
}

/// A recognizer-reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionError {
    /// Short machine-readable code, e.g. `no-speech` or `network`.
    pub code: String,
    /// Details.
    pub message: String,
}

impl RecognitionError {
    /// Create a recognition error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Events delivered by a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Every result recognized so far in this session, oldest first.
    Result(Vec<RecognitionResult>),
    /// Recognition failed; the session may or may not continue.
    Error(RecognitionError),
    /// The recognizer will send nothing more.
    End,
}

/// Concatenate the best alternative of every result.
#[must_use]
pub fn transcript_of(results: &[RecognitionResult]) -> String {
    results
        .iter()
        .filter_map(|result| result.alternatives.first())
        .map(|alternative| alternative.transcript.as_str())
        .collect()
}

/// A host speech-to-text capability.
pub trait SpeechRecognizer: Send + fmt::Debug {
    /// The name of this recognizer (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Whether the capability exists in this environment.
    fn is_available(&self) -> bool;

    /// Start a session, sending events through `events` until stopped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCapability`] when the recognizer is not
    /// available, or another error if the session fails to start.
    fn start(
        &mut self,
        options: &RecognitionOptions,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionSession>>;
}

/// A running recognition session.
pub trait RecognitionSession: Send + fmt::Debug {
    /// Stop listening and release the session's resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the session fails to stop cleanly.
    fn stop(&mut self) -> Result<()>;

    /// Check if the session is still producing events.
    fn is_running(&self) -> bool;
}

/// The recognizer used when the host has no speech recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl SpeechRecognizer for UnavailableRecognizer {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn start(
        &mut self,
        _options: &RecognitionOptions,
        _events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionSession>> {
        Err(Error::unsupported(SPEECH_RECOGNITION))
    }
}

/// Pick the host recognizer described by the configuration.
#[must_use]
pub fn host_recognizer(config: &DictationConfig) -> Box<dyn SpeechRecognizer> {
    match &config.command {
        Some(command) => Box::new(CommandRecognizer::new(command.clone(), config.args.clone())),
        None => Box::new(UnavailableRecognizer),
    }
}

#[derive(Debug)]
struct ActiveSession {
    handle: Box<dyn RecognitionSession>,
    events: mpsc::UnboundedReceiver<RecognitionEvent>,
    ended: bool,
}

/// Start/stop lifecycle around a [`SpeechRecognizer`].
#[derive(Debug)]
pub struct DictationController {
    recognizer: Box<dyn SpeechRecognizer>,
    options: RecognitionOptions,
    session: Option<ActiveSession>,
}

impl DictationController {
    /// Create a controller over `recognizer`.
    #[must_use]
    pub fn new(recognizer: Box<dyn SpeechRecognizer>, options: RecognitionOptions) -> Self {
        Self {
            recognizer,
            options,
            session: None,
        }
    }

    /// Create a controller over the configured host recognizer.
    #[must_use]
    pub fn from_config(config: &DictationConfig) -> Self {
        Self::new(host_recognizer(config), config.recognition_options())
    }

    /// Whether dictation can be started here.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Name of the underlying recognizer.
    #[must_use]
    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Options used for new sessions.
    #[must_use]
    pub fn options(&self) -> &RecognitionOptions {
        &self.options
    }

    /// Check if a session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session. Does nothing if one is already active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCapability`] when the host has no speech
    /// recognition, or the recognizer's error if the session fails to start.
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Dictation already active");
            return Ok(());
        }

        if !self.recognizer.is_available() {
            info!(recognizer = self.recognizer.name(), "Speech recognition unavailable");
            return Err(Error::unsupported(SPEECH_RECOGNITION));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.recognizer.start(&self.options, tx)?;
        info!(
            recognizer = self.recognizer.name(),
            language = %self.options.language,
            "Dictation started"
        );

        self.session = Some(ActiveSession {
            handle,
            events: rx,
            ended: false,
        });
        Ok(())
    }

    /// Drain pending events, returning the latest full transcript if any
    /// result arrived.
    ///
    /// Recognition errors are logged and otherwise ignored.
    pub fn poll(&mut self) -> Option<String> {
        let session = self.session.as_mut()?;
        let mut transcript = None;

        loop {
            match session.events.try_recv() {
                Ok(RecognitionEvent::Result(results)) => {
                    trace!(results = results.len(), "Recognition result");
                    transcript = Some(transcript_of(&results));
                }
                Ok(RecognitionEvent::Error(err)) => {
                    error!(
                        recognizer = self.recognizer.name(),
                        code = %err.code,
                        message = %err.message,
                        "Speech recognition error"
                    );
                }
                Ok(RecognitionEvent::End) => {
                    debug!(recognizer = self.recognizer.name(), "Recognition ended");
                    session.ended = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    session.ended = true;
                    break;
                }
            }
        }

        transcript
    }

    /// Check if the active session has stopped producing events on its own.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.ended || !session.handle.is_running())
    }

    /// Stop the active session. Does nothing if none is active.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            trace!("No dictation session to stop");
            return;
        };

        if let Err(e) = session.handle.stop() {
            warn!(recognizer = self.recognizer.name(), error = %e, "Failed to stop recognition cleanly");
        }
        info!(recognizer = self.recognizer.name(), "Dictation stopped");
    }
}

impl Drop for DictationController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::scripted;
    use super::*;

    fn controller(available: bool) -> (DictationController, testing::ScriptHandle) {
        let (recognizer, handle) = scripted(available);
        (
            DictationController::new(Box::new(recognizer), RecognitionOptions::default()),
            handle,
        )
    }

    #[test]
    fn test_transcript_of_concatenates_first_alternatives() {
        let results = vec![
            RecognitionResult::final_text("Olá"),
            RecognitionResult::final_text(" mundo"),
            RecognitionResult::interim_text(" de no"),
        ];
        assert_eq!(transcript_of(&results), "Olá mundo de no");
    }

    #[test]
    fn test_transcript_of_skips_empty_results() {
        let results = vec![
            RecognitionResult {
                alternatives: Vec::new(),
                is_final: true,
            },
            RecognitionResult::final_text("x"),
        ];
        assert_eq!(transcript_of(&results), "x");
        assert_eq!(transcript_of(&[]), "");
    }

    #[test]
    fn test_default_options() {
        let options = RecognitionOptions::default();
        assert_eq!(options.language, "pt-BR");
        assert!(options.continuous);
        assert!(options.interim_results);
        assert_eq!(options.max_alternatives, 1);
    }

    #[test]
    fn test_unavailable_recognizer() {
        let mut recognizer = UnavailableRecognizer;
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(!recognizer.is_available());
        let err = recognizer
            .start(&RecognitionOptions::default(), tx)
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_host_recognizer_selection() {
        let config = DictationConfig::default();
        assert_eq!(host_recognizer(&config).name(), "unavailable");

        let config = DictationConfig {
            command: Some("whisper-stream".to_string()),
            ..DictationConfig::default()
        };
        let recognizer = host_recognizer(&config);
        assert_eq!(recognizer.name(), "command");
        assert!(recognizer.is_available());
    }

    #[test]
    fn test_start_unsupported() {
        let (mut dictation, handle) = controller(false);

        let err = dictation.start().unwrap_err();
        assert!(err.is_unsupported());
        assert!(!dictation.is_active());
        assert_eq!(handle.starts(), 0);
    }

    #[test]
    fn test_start_passes_options() {
        let (recognizer, handle) = scripted(true);
        let options = RecognitionOptions {
            language: "en-US".to_string(),
            ..RecognitionOptions::default()
        };
        let mut dictation = DictationController::new(Box::new(recognizer), options.clone());

        dictation.start().unwrap();
        assert!(dictation.is_active());
        assert_eq!(handle.last_options(), Some(options));
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();
        dictation.start().unwrap();
        assert_eq!(handle.starts(), 1);
    }

    #[test]
    fn test_poll_returns_latest_full_transcript() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();

        assert_eq!(dictation.poll(), None);

        handle.emit_results(&[RecognitionResult::interim_text("Comp")]);
        handle.emit_results(&[RecognitionResult::final_text("Comprar")]);
        handle.emit_results(&[
            RecognitionResult::final_text("Comprar"),
            RecognitionResult::interim_text(" leite"),
        ]);

        assert_eq!(dictation.poll().as_deref(), Some("Comprar leite"));
        assert_eq!(dictation.poll(), None);
    }

    #[test]
    fn test_poll_without_session() {
        let (mut dictation, _handle) = controller(true);
        assert_eq!(dictation.poll(), None);
    }

    #[test]
    fn test_errors_do_not_end_session() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();

        handle.emit(RecognitionEvent::Error(RecognitionError::new(
            "no-speech",
            "nothing heard",
        )));
        handle.emit_results(&[RecognitionResult::final_text("ainda aqui")]);

        assert_eq!(dictation.poll().as_deref(), Some("ainda aqui"));
        assert!(dictation.is_active());
        assert!(!dictation.has_ended());
    }

    #[test]
    fn test_end_event_marks_ended() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();

        handle.emit(RecognitionEvent::End);
        assert_eq!(dictation.poll(), None);
        assert!(dictation.has_ended());
        // Still active until explicitly stopped
        assert!(dictation.is_active());
    }

    #[test]
    fn test_finished_session_marks_ended() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();
        assert!(!dictation.has_ended());

        handle.finish();
        assert!(dictation.has_ended());
        assert!(dictation.is_active());
    }

    #[test]
    fn test_stop() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();

        dictation.stop();
        assert!(!dictation.is_active());
        assert_eq!(handle.stops(), 1);
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let (mut dictation, handle) = controller(true);
        dictation.stop();
        dictation.stop();
        assert_eq!(handle.stops(), 0);
    }

    #[test]
    fn test_stop_failure_is_swallowed() {
        let (mut dictation, handle) = controller(true);
        handle.fail_stop(true);
        dictation.start().unwrap();

        dictation.stop();
        assert!(!dictation.is_active());
    }

    #[test]
    fn test_start_failure_propagates() {
        let (mut dictation, handle) = controller(true);
        handle.fail_start(true);

        let err = dictation.start().unwrap_err();
        assert!(matches!(err, Error::RecognitionStart { .. }));
        assert!(!dictation.is_active());
    }

    #[test]
    fn test_drop_stops_session() {
        let (mut dictation, handle) = controller(true);
        dictation.start().unwrap();
        drop(dictation);
        assert_eq!(handle.stops(), 1);
    }

    #[test]
    fn test_recognition_error_display() {
        let err = RecognitionError::new("network", "offline");
        assert_eq!(err.to_string(), "network: offline");
    }
}
