// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.
//!
//! Logs go to a file in the data directory so they never interleave with the
//! interactive session. `RUST_LOG` overrides the level.

use std::fs;
use std::path::Path;

use tracing_subscriber::EnvFilter;

pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber. Does nothing if one is already set.
pub fn setup(log_path: &Path, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    // Try to open log file, fall back to stderr
    let installed = if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("subscriber already installed");
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
