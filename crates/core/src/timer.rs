// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-second session clock.
//!
//! A spawned task ticks once per period and hands a [`Tick`] to a callback.
//! Count-up mode reports elapsed seconds; count-down mode additionally reports
//! the seconds left until a fixed wall-clock deadline. Elapsed time is derived
//! from the [`ClockSource`] rather than by counting ticks, so a late tick never
//! accumulates drift.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::ClockSource;

/// Default tick period.
pub const TICK: Duration = Duration::from_secs(1);

/// What the timer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Elapsed time only.
    CountUp,
    /// Elapsed time plus time left until `deadline_ms` (wall clock).
    CountDown { deadline_ms: u64 },
}

impl TimerMode {
    pub fn deadline_ms(&self) -> Option<u64> {
        match self {
            TimerMode::CountUp => None,
            TimerMode::CountDown { deadline_ms } => Some(*deadline_ms),
        }
    }
}

/// One timer reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub elapsed_secs: u64,
    /// Seconds left, rounded up. `Some(0)` once the deadline has passed.
    pub remaining_secs: Option<u64>,
}

impl Tick {
    pub fn expired(&self) -> bool {
        self.remaining_secs == Some(0)
    }
}

/// Persisted timer state, enough to resume after a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub elapsed_secs: u64,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Reads a timer from wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopwatch {
    /// Elapsed seconds carried over from a previous run.
    pub offset_secs: u64,
    /// Wall time this run started.
    pub started_ms: u64,
    pub mode: TimerMode,
}

impl Stopwatch {
    pub fn new(mode: TimerMode, offset_secs: u64, started_ms: u64) -> Self {
        Stopwatch {
            offset_secs,
            started_ms,
            mode,
        }
    }

    pub fn read(&self, now_ms: u64) -> Tick {
        let elapsed_secs = self.offset_secs + now_ms.saturating_sub(self.started_ms) / 1000;
        let remaining_secs = self
            .mode
            .deadline_ms()
            .map(|deadline| deadline.saturating_sub(now_ms).div_ceil(1000));
        Tick {
            elapsed_secs,
            remaining_secs,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> TimerSnapshot {
        TimerSnapshot {
            elapsed_secs: self.read(now_ms).elapsed_secs,
            deadline_ms: self.mode.deadline_ms(),
        }
    }
}

/// Handle to a running timer task.
///
/// Cancelling, or dropping the handle, stops the task before its next tick.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Cancels and waits for the task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns a timer task.
///
/// `on_tick` runs on the timer task after each period. Returning
/// `ControlFlow::Break` stops the timer.
pub fn start<F>(
    clock: Arc<dyn ClockSource>,
    stopwatch: Stopwatch,
    period: Duration,
    mut on_tick: F,
) -> TimerHandle
where
    F: FnMut(Tick) -> ControlFlow<()> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    debug!(mode = ?stopwatch.mode, offset_secs = stopwatch.offset_secs, "timer started");

    let join = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = interval.tick() => {}
            }
            let tick = stopwatch.read(clock.now_ms());
            if on_tick(tick).is_break() {
                break;
            }
        }
        debug!("timer stopped");
    });

    TimerHandle {
        token,
        join: Some(join),
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
