// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use proctor_core::ResponseCache;

use crate::cli::CacheCommand;
use crate::error::Result;

use super::Context;

pub fn run(ctx: &Context, cmd: CacheCommand) -> Result<()> {
    let cache = ctx.cache(ctx.store()?);
    run_impl(&cache, cmd, &mut std::io::stdout())
}

pub(crate) fn run_impl<W: Write>(cache: &ResponseCache, cmd: CacheCommand, out: &mut W) -> Result<()> {
    match cmd {
        CacheCommand::Clear => {
            let removed = cache.len();
            cache.clear();
            let noun = if removed == 1 { "entry" } else { "entries" };
            writeln!(out, "Removed {} cached {}.", removed, noun)?;
        }
        CacheCommand::Count => writeln!(out, "{}", cache.len())?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
