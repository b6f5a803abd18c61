// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! proctor_cli - command-line front end for the assessment service.
//!
//! This crate provides the `proctor` binary: configuration loading, logging
//! setup, an interactive test session on stdin, and cached reads of results
//! and statistics.
//!
//! # Main Components
//!
//! - [`Cli`] - Command-line definition
//! - [`Config`] - User configuration from `config.toml` and the environment
//! - [`Error`] - Error types for all operations
//!
//! ```rust,ignore
//! use clap::Parser;
//! use proctor_cli::{run, Cli};
//!
//! run(Cli::parse())?;
//! ```

mod cli;
pub mod colors;
mod commands;
mod display;
pub mod env;
pub mod logging;

pub mod config;
pub mod error;

pub use cli::{CacheCommand, Cli, Command, ConfigCommand};
pub use config::Config;
pub use error::{Error, Result};

use commands::Context;

/// Execute a parsed command line. This is the main entry point for library
/// users and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let config_path = config::resolve_config_path(cli.config.as_deref());
    if cli.command == (Command::Config {
        command: ConfigCommand::Path,
    }) {
        // Works even when the file at that path does not parse.
        println!("{}", config_path.display());
        return Ok(());
    }
    let config = Config::load_effective(&config_path)?;
    logging::setup(&config.log_path(), cli.verbose);
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let ctx = Context::new(config, config_path);
    dispatch(&ctx, cli.command)
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Take { topic, exam } => commands::take::run(ctx, topic, exam),
        Command::Result { id } => commands::result::run(ctx, &id),
        Command::Stats { student } => commands::stats::run_stats(ctx, student),
        Command::History { student } => commands::stats::run_history(ctx, student),
        Command::Cache { command } => commands::cache::run(ctx, command),
        Command::Config { command } => commands::config::run(ctx, command),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
