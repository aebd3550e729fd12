//! Speech recognition through an external program.
//!
//! The program is started with the session options in its environment and
//! reports recognition updates on stdout, one per line:
//!
//! ```text
//! interim:<text>   replaces the trailing interim result
//! final:<text>     replaces the trailing interim result, then is kept
//! error:<text>     reports a recognition error
//! <text>           same as final:<text>
//! ```
//!
//! Text is taken verbatim after the prefix, so a recognizer separates
//! consecutive results by starting them with a space.

use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::{
    RecognitionError, RecognitionEvent, RecognitionOptions, RecognitionResult, RecognitionSession,
    SpeechRecognizer,
};

/// Environment variable carrying the language tag.
pub const LANGUAGE_ENV: &str = "NOTECARDS_DICTATION_LANG";
/// Environment variable carrying `continuous` (`true`/`false`).
pub const CONTINUOUS_ENV: &str = "NOTECARDS_DICTATION_CONTINUOUS";
/// Environment variable carrying `interim_results` (`true`/`false`).
pub const INTERIM_RESULTS_ENV: &str = "NOTECARDS_DICTATION_INTERIM_RESULTS";
/// Environment variable carrying `max_alternatives`.
pub const MAX_ALTERNATIVES_ENV: &str = "NOTECARDS_DICTATION_MAX_ALTERNATIVES";

const NAME: &str = "command";

/// A [`SpeechRecognizer`] backed by an external speech-to-text program.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    /// Create a recognizer running `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The configured program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_available(&self) -> bool {
        !self.program.trim().is_empty()
    }

    fn start(
        &mut self,
        options: &RecognitionOptions,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionSession>> {
        if !self.is_available() {
            return Err(Error::unsupported(super::SPEECH_RECOGNITION));
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(LANGUAGE_ENV, &options.language)
            .env(CONTINUOUS_ENV, options.continuous.to_string())
            .env(INTERIM_RESULTS_ENV, options.interim_results.to_string())
            .env(MAX_ALTERNATIVES_ENV, options.max_alternatives.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        // Own process group, so stopping also reaches anything the program forks.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::recognition_start(NAME, format!("{}: {e}", self.program)))?;

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(Error::recognition_start(NAME, "stdout was not captured"));
        };

        let interim_results = options.interim_results;
        let reader = thread::Builder::new()
            .name("notecards-dictation".to_string())
            .spawn(move || read_updates(stdout, interim_results, &events));

        match reader {
            Ok(reader) => {
                debug!(program = %self.program, pid = child.id(), "Recognizer process started");
                Ok(Box::new(CommandSession {
                    child,
                    reader: Some(reader),
                }))
            }
            Err(e) => {
                reap(&mut child);
                Err(Error::recognition_start(NAME, e.to_string()))
            }
        }
    }
}

fn reap(child: &mut Child) {
    if let Err(e) = terminate(child) {
        debug!(error = %e, "Recognizer process already gone");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "Failed to reap recognizer process");
    }
}

/// Kill the recognizer's process group.
#[cfg(unix)]
#[allow(unsafe_code)]
fn terminate(child: &mut Child) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "process id out of range"))?;

    // SAFETY: kill(2) takes no pointers. The group id is the child's pid, set
    // by `process_group(0)` at spawn, and the child is not reaped yet.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        debug!(error = %err, "Could not signal recognizer process group");
        child.kill().or_else(ignore_exited)
    }
}

/// Kill the recognizer process.
#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.kill().or_else(ignore_exited)
}

fn ignore_exited(e: io::Error) -> io::Result<()> {
    if e.kind() == ErrorKind::InvalidInput {
        Ok(())
    } else {
        Err(e)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Update<'a> {
    Interim(&'a str),
    Final(&'a str),
    Error(&'a str),
}

fn parse_update(line: &str) -> Option<Update<'_>> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return None;
    }
    if let Some(text) = line.strip_prefix("interim:") {
        Some(Update::Interim(text))
    } else if let Some(text) = line.strip_prefix("final:") {
        Some(Update::Final(text))
    } else if let Some(text) = line.strip_prefix("error:") {
        Some(Update::Error(text))
    } else {
        Some(Update::Final(line))
    }
}

/// Apply an update to the session's results; returns `false` for updates
/// that do not change them.
fn apply_update(
    results: &mut Vec<RecognitionResult>,
    update: &Update<'_>,
    interim_results: bool,
) -> bool {
    let (text, is_final) = match *update {
        Update::Interim(_) if !interim_results => return false,
        Update::Interim(text) => (text, false),
        Update::Final(text) => (text, true),
        Update::Error(_) => return false,
    };

    if results.last().is_some_and(|last| !last.is_final) {
        results.pop();
    }
    results.push(if is_final {
        RecognitionResult::final_text(text)
    } else {
        RecognitionResult::interim_text(text)
    });
    true
}

fn read_updates<R: Read>(
    stdout: R,
    interim_results: bool,
    events: &mpsc::UnboundedSender<RecognitionEvent>,
) {
    let mut results: Vec<RecognitionResult> = Vec::new();

    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                // The receiver may already be gone.
                let _ = events.send(RecognitionEvent::Error(RecognitionError::new(
                    "io",
                    e.to_string(),
                )));
                break;
            }
        };

        let Some(update) = parse_update(&line) else {
            continue;
        };

        let event = if let Update::Error(message) = update {
            RecognitionEvent::Error(RecognitionError::new("recognizer", message))
        } else if apply_update(&mut results, &update, interim_results) {
            RecognitionEvent::Result(results.clone())
        } else {
            continue;
        };

        if events.send(event).is_err() {
            debug!("Dictation receiver dropped, stopping reader");
            return;
        }
    }

    let _ = events.send(RecognitionEvent::End);
}

#[derive(Debug)]
struct CommandSession {
    child: Child,
    reader: Option<JoinHandle<()>>,
}

impl RecognitionSession for CommandSession {
    fn stop(&mut self) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };

        let killed = terminate(&mut self.child);
        let waited = self.child.wait();

        // A reader still blocked on the pipe exits on EOF or once the
        // receiver is gone; it is never joined here.
        if reader.is_finished() {
            if reader.join().is_err() {
                warn!("Dictation reader thread panicked");
            }
        } else {
            debug!("Detaching dictation reader");
        }

        killed?;
        waited?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| !reader.is_finished())
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop recognizer process");
        }
    }
}
