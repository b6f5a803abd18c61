// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal colors for help and session output.
//!
//! Respects environment variables:
//! - `NO_COLOR=1`: Disables colors
//! - `COLOR=1`: Forces colors even without TTY

use std::io::IsTerminal;

use clap::builder::styling::Styles;

use crate::env;

/// ANSI 256-color codes.
pub mod codes {
    /// Section headers: pastel cyan/steel blue
    pub const HEADER: u8 = 74;
    /// Commands/literals: light grey
    pub const LITERAL: u8 = 250;
    /// Hints and secondary values: medium grey
    pub const CONTEXT: u8 = 245;
    /// Passed results and committed answers
    pub const GOOD: u8 = 114;
    /// Failures and low time warnings
    pub const BAD: u8 = 174;
}

/// Check if colors should be enabled based on TTY and environment variables.
pub fn should_colorize() -> bool {
    if env::no_color() {
        return false;
    }
    if env::force_color() {
        return true;
    }
    std::io::stdout().is_terminal()
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

const RESET: &str = "\x1b[0m";

fn paint(code: u8, text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", fg256(code), text, RESET)
    } else {
        text.to_string()
    }
}

pub fn header(text: &str) -> String {
    paint(codes::HEADER, text)
}

pub fn context(text: &str) -> String {
    paint(codes::CONTEXT, text)
}

pub fn good(text: &str) -> String {
    paint(codes::GOOD, text)
}

pub fn bad(text: &str) -> String {
    paint(codes::BAD, text)
}

/// Clap styles for help output.
pub fn styles() -> Styles {
    if !should_colorize() {
        return Styles::plain();
    }

    use anstyle::{Ansi256Color, Color, Style};

    let color = |code: u8| Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(code))));

    Styles::styled()
        .header(color(codes::HEADER))
        .usage(color(codes::HEADER))
        .literal(color(codes::LITERAL))
        .placeholder(color(codes::CONTEXT))
        .valid(color(codes::CONTEXT))
        .error(color(codes::BAD))
}

#[cfg(test)]
#[path = "colors_tests.rs"]
pub(crate) mod tests;
