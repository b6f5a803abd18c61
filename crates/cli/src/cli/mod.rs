// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::colors;

#[derive(Parser, Debug)]
#[command(name = "proctor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Take online assessments from the terminal")]
#[command(
    long_about = "Take online assessments from the terminal.\n\n\
    Progress is saved locally while you work, so an interrupted test can be resumed."
)]
#[command(styles = colors::styles())]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Start or resume a test on a topic
    #[command(after_help = "\
Session commands:
  p <question> <choice>   Select a choice
  w <question> <choice>   Clear a selected choice
  f                       Commit the selection for the current question
  g <question>            Go to a question
  n                       Fetch the current question from the server
  a                       Send the current answer to the server
  s                       Save progress
  status                  Show progress and time
  submit                  Finish the test and show the result
  quit                    Save and leave")]
    Take {
        /// Topic identifier
        topic: u64,

        /// Take the graded exam instead of a training run
        #[arg(long)]
        exam: bool,
    },

    /// Show a graded result
    Result {
        /// Result identifier
        id: String,
    },

    /// Show a student's aggregate statistics
    Stats {
        /// Student identifier
        student: u64,
    },

    /// List a student's past tests
    History {
        /// Student identifier
        student: u64,
    },

    /// Manage cached responses
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Remove every cached response
    Clear,
    /// Print the number of cached responses
    Count,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
