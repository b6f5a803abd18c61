// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, classified retry of transport calls.
//!
//! A call is re-issued while retries remain and [`RetryableError::should_retry`]
//! holds. Delay before retry `n` (1-indexed) is `base_delay * factor^(n-1)`,
//! uncapped and without jitter; the small default budget is the only bound.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::RetryableError;

/// Retry schedule for one transport invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = retries + 1).
    pub retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per retry.
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(1000),
            factor: 1.5,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            retries,
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before the given retry (1-indexed).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let nanos = self.base_delay.as_nanos() as f64 * self.factor.powi(exponent);
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Runs `operation`, retrying classified failures.
    ///
    /// The last error propagates unchanged once the budget is spent or the
    /// error is terminal.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryableError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RetryableError>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.retries && e.should_retry() => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(
                        retry,
                        of = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        status = ?e.status_code,
                        error = %e,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
