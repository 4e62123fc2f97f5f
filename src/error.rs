/*!
 * Error types for Frond
 */

use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while talking to a device or driving an update session.
///
/// The three failure families the rest of the crate cares about:
/// - `Transport`: the request never produced a device response (connection
///   refused, reset, timed out). The device may be rebooting or gone.
/// - `Api`: the device answered with a non-success status and a payload.
/// - `RetriesExhausted`: the retry loop gave up; the last underlying
///   failure is retained as text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Network-level failure; no device response was received
    #[error("transport failure: {0}")]
    Transport(String),

    /// The device answered with a non-success status
    #[error("device returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The device answered 200 but the payload did not parse
    #[error("malformed device payload: {0}")]
    Payload(String),

    /// The retry loop gave up
    #[error("retries exhausted after {attempts} attempts (last backoff {last_backoff:?}): {reason}")]
    RetriesExhausted {
        attempts: u32,
        last_backoff: Duration,
        reason: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// An update session is already active
    #[error("update session busy in phase {phase}")]
    UpdateBusy { phase: String },

    /// A toggle write is already in flight
    #[error("a toggle write is already in flight")]
    TogglePending,
}

impl Error {
    /// Check if the retry loop should try this operation again.
    ///
    /// Transport failures and non-success device responses are retryable; a
    /// payload that arrived but did not parse is not, and neither are local
    /// state errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Api { .. })
    }

    /// Check if this is a transport-level failure (no device response).
    ///
    /// The update orchestrator uses this to tell a rebooting device apart
    /// from one that answered and refused.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport(_) => ErrorCategory::Transport,
            Error::Api { .. } => ErrorCategory::Application,
            Error::Payload(_) => ErrorCategory::Payload,
            Error::RetriesExhausted { .. } => ErrorCategory::Retry,
            Error::Config(_) => ErrorCategory::Configuration,
            Error::UpdateBusy { .. } | Error::TogglePending => ErrorCategory::State,
        }
    }
}

/// Error category for classification and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network/connection errors
    Transport,
    /// Well-formed device error responses
    Application,
    /// Unparseable device payloads
    Payload,
    /// Retry exhaustion
    Retry,
    /// Configuration errors
    Configuration,
    /// Local state-machine rejections
    State,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Application => write!(f, "application"),
            ErrorCategory::Payload => write!(f, "payload"),
            ErrorCategory::Retry => write!(f, "retry"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::State => write!(f, "state"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Payload(err.to_string())
        } else if let Some(status) = err.status() {
            Error::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            // Connect, timeout, redirect and body errors all mean the
            // exchange never completed.
            Error::Transport(err.to_string())
        }
    }
}
