//! Error types for phone-enrich
//!
//! This module provides the error handling for the library, including:
//! - Local request validation errors (surfaced before any network activity)
//! - Transport and server-reported failures (terminal for the active job)
//! - Frame-level parse errors (recovered per line, never terminal)

use thiserror::Error;

/// Result type alias for phone-enrich operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for phone-enrich
///
/// Each variant corresponds to one failure class of the job lifecycle.
/// `Frame` errors are special: the dispatcher logs and skips the offending
/// line, so they never abort a running stream.
#[derive(Debug, Error)]
pub enum Error {
    /// Request failed local validation; nothing was sent to the collaborator
    #[error("invalid request: {message}")]
    Validation {
        /// Human-readable description of the violated constraint
        message: String,
        /// The request field that caused the error (e.g., "phone_numbers")
        field: &'static str,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "endpoint")
        key: Option<String>,
    },

    /// Transport-level failure: connection failure, premature stream close,
    /// or a buffered line exceeding the configured cap
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A single wire frame carried a malformed JSON payload
    #[error("malformed frame payload: {0}")]
    Frame(#[from] serde_json::Error),

    /// The collaborator reported a terminal error event
    #[error("server error: {0}")]
    Server(String),

    /// The job was cancelled by a local caller
    #[error("job cancelled")]
    Cancelled,

    /// No job has been submitted yet
    #[error("no active job")]
    NoJob,
}

impl Error {
    /// Construct a validation error for a named request field
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field,
        }
    }
}
