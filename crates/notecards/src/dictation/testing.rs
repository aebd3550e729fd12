//! Scripted recognizer for tests.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::{RecognitionEvent, RecognitionOptions, RecognitionResult, RecognitionSession, SpeechRecognizer};

#[derive(Debug, Default)]
struct ScriptState {
    sender: Option<mpsc::UnboundedSender<RecognitionEvent>>,
    last_options: Option<RecognitionOptions>,
    starts: usize,
    stops: usize,
    fail_start: bool,
    fail_stop: bool,
    finished: bool,
}

/// Test-side control over a [`ScriptedRecognizer`].
#[derive(Debug, Clone)]
pub(crate) struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    pub(crate) fn emit(&self, event: RecognitionEvent) {
        let state = self.state.lock().unwrap();
        if let Some(sender) = &state.sender {
            sender.send(event).unwrap();
        }
    }

    pub(crate) fn emit_results(&self, results: &[RecognitionResult]) {
        self.emit(RecognitionEvent::Result(results.to_vec()));
    }

    pub(crate) fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub(crate) fn last_options(&self) -> Option<RecognitionOptions> {
        self.state.lock().unwrap().last_options.clone()
    }

    pub(crate) fn fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    /// Make the running session report that it stopped on its own.
    pub(crate) fn finish(&self) {
        self.state.lock().unwrap().finished = true;
    }

    pub(crate) fn fail_stop(&self, fail: bool) {
        self.state.lock().unwrap().fail_stop = fail;
    }
}

/// A recognizer whose events are pushed by the test.
#[derive(Debug)]
pub(crate) struct ScriptedRecognizer {
    available: bool,
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug)]
struct ScriptedSession {
    state: Arc<Mutex<ScriptState>>,
    running: bool,
}

pub(crate) fn scripted(available: bool) -> (ScriptedRecognizer, ScriptHandle) {
    let state = Arc::new(Mutex::new(ScriptState::default()));
    (
        ScriptedRecognizer {
            available,
            state: Arc::clone(&state),
        },
        ScriptHandle { state },
    )
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn start(
        &mut self,
        options: &RecognitionOptions,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionSession>> {
        if !self.available {
            return Err(Error::unsupported(super::SPEECH_RECOGNITION));
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_start {
            return Err(Error::recognition_start("scripted", "refused to start"));
        }
        state.starts += 1;
        state.finished = false;
        state.last_options = Some(options.clone());
        state.sender = Some(events);

        Ok(Box::new(ScriptedSession {
            state: Arc::clone(&self.state),
            running: true,
        }))
    }
}

impl RecognitionSession for ScriptedSession {
    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        state.sender = None;
        self.running = false;
        if state.fail_stop {
            return Err(Error::internal("scripted stop failure"));
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running && !self.state.lock().unwrap().finished
    }
}
