//! Error types for notecards.
//!
//! This module defines all error types used throughout the notecards crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for notecards operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to write a value to the file store.
    #[error("failed to write {path}: {source}")]
    StorageWrite {
        /// Path of the file being written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A storage key cannot be used as a file name.
    #[error("invalid storage key '{key}'")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Dictation Errors ===
    /// The host environment has no usable capability of this kind.
    #[error("{capability} is not supported in this environment")]
    UnsupportedCapability {
        /// Name of the missing capability.
        capability: &'static str,
    },

    /// A speech recognizer failed to start a session.
    #[error("failed to start recognizer '{recognizer}': {message}")]
    RecognitionStart {
        /// Name of the recognizer.
        recognizer: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for notecards operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unsupported capability error.
    #[must_use]
    pub fn unsupported(capability: &'static str) -> Self {
        Self::UnsupportedCapability { capability }
    }

    /// Create a recognizer start error.
    #[must_use]
    pub fn recognition_start(recognizer: &'static str, message: impl Into<String>) -> Self {
        Self::RecognitionStart {
            recognizer,
            message: message.into(),
        }
    }

    /// Check if this error means a host capability is missing.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedCapability { .. })
    }
}
