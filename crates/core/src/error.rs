// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for proctor-core operations.
//!
//! Two layers:
//! - [`RetryableError`] is the single shape that crosses the transport/retry
//!   boundary. The transport normalizes every raw failure into it and the
//!   retry policy decides from its fields alone.
//! - [`Error`] is what the API client and the session engine return to their
//!   callers.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Status codes that are never retried, whatever the `retryable` flag says.
pub const TERMINAL_STATUSES: [u16; 2] = [400, 404];

/// Status used for client-side timeouts.
pub const TIMEOUT_STATUS: u16 = 408;

/// A normalized request failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RetryableError {
    /// Human-readable message, taken from the response body when there is one.
    pub message: String,
    /// HTTP status, absent when no response was received or it was unreadable.
    pub status_code: Option<u16>,
    /// Whether the failure may succeed on a later attempt.
    pub retryable: bool,
}

/// Classification of a [`RetryableError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request timed out (client-side abort or 408).
    NetworkTimeout,
    /// No response at all: connection refused, reset, DNS failure.
    Network,
    /// 5xx response.
    ServerError,
    /// 4xx response other than 408.
    ClientError,
    /// The response could not be understood.
    MalformedResponse,
}

impl RetryableError {
    /// Creates an error from its raw parts.
    pub fn new(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        RetryableError {
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// The request was aborted by the transport's timer.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            format!("request timed out after {}ms", after.as_millis()),
            Some(TIMEOUT_STATUS),
            true,
        )
    }

    /// The request never produced a response.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, None, true)
    }

    /// A non-success response. 408 and 5xx are retryable, everything else is not.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let retryable = status == TIMEOUT_STATUS || (500..600).contains(&status);
        Self::new(message, Some(status), retryable)
    }

    /// A success response whose body could not be decoded.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(message, None, false)
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self.status_code {
            Some(TIMEOUT_STATUS) => ErrorKind::NetworkTimeout,
            Some(s) if s >= 500 => ErrorKind::ServerError,
            Some(_) => ErrorKind::ClientError,
            None if self.retryable => ErrorKind::Network,
            None => ErrorKind::MalformedResponse,
        }
    }

    /// True for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }

    /// True when the retry policy may re-issue the request.
    pub fn should_retry(&self) -> bool {
        self.retryable
            && !self
                .status_code
                .is_some_and(|s| TERMINAL_STATUSES.contains(&s))
    }
}

/// Lifecycle phase of a [`SessionEngine`](crate::session::SessionEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Initializing,
    InProgress,
    Submitting,
    Finished,
    Error,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Initializing => "initializing",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Finished => "finished",
            SessionPhase::Error => "in error",
        };
        f.write_str(s)
    }
}

/// All possible errors returned by the API client and session engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Request(#[from] RetryableError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("session not found: {0}\n  hint: start a new session")]
    SessionNotFound(String),

    #[error("cannot {action} while session is {phase}")]
    InvalidState {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("a submission is already in progress")]
    SubmitInProgress,

    #[error("no active session")]
    NoActiveSession,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Maps the error to a sentence suitable for showing to a test taker.
    pub fn user_message(&self) -> String {
        match self {
            Error::Request(e) => match e.kind() {
                ErrorKind::NetworkTimeout => {
                    "The server is taking too long to respond. Check your connection and try again."
                        .to_string()
                }
                ErrorKind::Network => {
                    "Could not reach the server. Check your connection and try again.".to_string()
                }
                ErrorKind::ServerError => {
                    "The server ran into a problem. Please try again in a moment.".to_string()
                }
                ErrorKind::ClientError if e.is_not_found() => {
                    "The requested item was not found.".to_string()
                }
                ErrorKind::ClientError => format!("The request was rejected: {}", e.message),
                ErrorKind::MalformedResponse => {
                    "The server sent a response that could not be read.".to_string()
                }
            },
            Error::Validation(msg) => msg.clone(),
            Error::SessionNotFound(_) => {
                "This test session no longer exists. Please start the test again.".to_string()
            }
            Error::InvalidState { .. } | Error::NoActiveSession => {
                "That action is not available right now.".to_string()
            }
            Error::SubmitInProgress => "Your test is already being submitted.".to_string(),
            Error::Store(_) | Error::Json(_) => {
                "Progress could not be saved on this device.".to_string()
            }
        }
    }

    /// True when the error came from a request that could be retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Request(e) if e.should_retry())
    }
}

/// A specialized Result type for proctor-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
