// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use proctor_core::protocol::{StudentStatistics, TestSummary};
use proctor_core::{AssessmentApi, ResponseCache, Transport};

use crate::display::{format_history, format_stats};
use crate::error::Result;

use super::{runtime, Context};

pub fn run_stats(ctx: &Context, student: u64) -> Result<()> {
    let cache = ctx.cache(ctx.store()?);
    let api = ctx.api();
    let stats = runtime()?.block_on(fetch_stats(&api, &cache, student))?;
    print!("{}", format_stats(student, &stats));
    Ok(())
}

pub fn run_history(ctx: &Context, student: u64) -> Result<()> {
    let cache = ctx.cache(ctx.store()?);
    let api = ctx.api();
    let tests = runtime()?.block_on(fetch_history(&api, &cache, student))?;
    print!("{}", format_history(student, &tests));
    Ok(())
}

/// Zeroed statistics are never cached, so a first test shows up at once.
pub(crate) async fn fetch_stats<T: Transport>(
    api: &AssessmentApi<T>,
    cache: &ResponseCache,
    student: u64,
) -> Result<StudentStatistics> {
    let key = format!("stats_{}", student);
    let stats = cache
        .get_or_fetch(&key, || api.student_statistics(student))
        .await?;
    if stats == StudentStatistics::default() {
        cache.remove(&key);
    }
    Ok(stats)
}

pub(crate) async fn fetch_history<T: Transport>(
    api: &AssessmentApi<T>,
    cache: &ResponseCache,
    student: u64,
) -> Result<Vec<TestSummary>> {
    let key = format!("history_{}", student);
    Ok(cache
        .get_or_fetch(&key, || api.tests_by_student(student))
        .await?)
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
