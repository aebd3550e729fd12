//! User notices.
//!
//! Two kinds of notice exist: a blocking alert the user must acknowledge,
//! and a transient success message.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::debug;

/// Fixed user-facing strings.
pub mod messages {
    /// Shown after a note is saved.
    pub const NOTE_CREATED: &str = "Nota criada com sucesso!";

    /// Shown when dictation is requested but unavailable.
    pub const DICTATION_UNSUPPORTED: &str =
        "Infelizmente seu ambiente não suporta a API de gravação!";
}

/// Destination for notices raised by the note dialog.
pub trait Notifier {
    /// Show a notice and wait for the user to acknowledge it.
    fn alert(&mut self, message: &str);

    /// Show a short-lived confirmation.
    fn success(&mut self, message: &str);
}

/// Terminal notices: alerts on stderr, confirmations on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    wait_for_ack: bool,
}

impl ConsoleNotifier {
    /// Create a notifier that waits for Enter after alerts when stdin is a
    /// terminal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            wait_for_ack: io::stdin().is_terminal(),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn alert(&mut self, message: &str) {
        let mut stderr = io::stderr().lock();
        if self.wait_for_ack {
            let _ = write!(stderr, "{message} [Enter] ");
            let _ = stderr.flush();
            let mut ack = String::new();
            if let Err(e) = io::stdin().lock().read_line(&mut ack) {
                debug!(error = %e, "Could not read alert acknowledgement");
            }
        } else {
            let _ = writeln!(stderr, "{message}");
        }
    }

    fn success(&mut self, message: &str) {
        println!("{message}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Notifier;

    /// Notifier that remembers what it was asked to show.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) alerts: Vec<String>,
        pub(crate) successes: Vec<String>,
    }

    impl Notifier for RecordingNotifier {
        fn alert(&mut self, message: &str) {
            self.alerts.push(message.to_string());
        }

        fn success(&mut self, message: &str) {
            self.successes.push(message.to_string());
        }
    }
}
