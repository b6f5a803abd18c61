// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use proctor_core::{AssessmentApi, ResponseCache, TestResult, Transport};

use crate::display::format_result;
use crate::error::Result;

use super::{runtime, Context};

pub fn run(ctx: &Context, id: &str) -> Result<()> {
    let cache = ctx.cache(ctx.store()?);
    let api = ctx.api();
    let result = runtime()?.block_on(fetch(&api, &cache, id))?;
    print!("{}", format_result(&result));
    Ok(())
}

/// Graded results never change, so a cached copy is always good.
pub(crate) async fn fetch<T: Transport>(
    api: &AssessmentApi<T>,
    cache: &ResponseCache,
    id: &str,
) -> Result<TestResult> {
    let key = format!("result_{}", id);
    Ok(cache.get_or_fetch(&key, || api.get_result(id)).await?)
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
