// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the proctor CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config file {path}: {message}\n  hint: run 'proctor config show' to see the expected layout")]
    ConfigParse { path: String, message: String },

    #[error("{0}")]
    Core(#[from] proctor_core::Error),

    #[error("{0}")]
    Usage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Sentence suitable for a test taker, falling back to the full message.
    pub fn user_message(&self) -> String {
        match self {
            Error::Core(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

impl From<proctor_core::StoreError> for Error {
    fn from(e: proctor_core::StoreError) -> Self {
        Error::Core(proctor_core::Error::Store(e))
    }
}

/// A specialized Result type for proctor CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
