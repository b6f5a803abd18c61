// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable time sources.
//!
//! Cache timestamps and exam deadlines are wall-clock milliseconds so they stay
//! meaningful across a reload. Tests substitute [`ManualClock`], or run on a
//! paused tokio runtime with [`TokioClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Trait for getting the current wall clock time.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

fn system_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        system_now_ms()
    }
}

/// Wall time anchored once, then advanced by tokio's monotonic clock.
///
/// Never goes backwards when the system clock is adjusted, and follows
/// `tokio::time::pause`/`advance` in tests.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch_ms: u64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    /// Anchors at the current system time.
    pub fn new() -> Self {
        Self::starting_at(system_now_ms())
    }

    /// Anchors at an explicit wall time.
    pub fn starting_at(epoch_ms: u64) -> Self {
        TokioClock {
            epoch_ms,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for TokioClock {
    fn now_ms(&self) -> u64 {
        self.epoch_ms + self.anchor.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: ClockSource> ClockSource for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
