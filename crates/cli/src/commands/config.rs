// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use crate::cli::ConfigCommand;
use crate::error::Result;

use super::Context;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    run_impl(ctx, cmd, &mut std::io::stdout())
}

pub(crate) fn run_impl<W: Write>(ctx: &Context, cmd: ConfigCommand, out: &mut W) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let mut effective = ctx.config.clone();
            effective.data_dir = Some(effective.data_dir());
            write!(out, "{}", effective.to_toml()?)?;
        }
        ConfigCommand::Path => writeln!(out, "{}", ctx.config_path.display())?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
