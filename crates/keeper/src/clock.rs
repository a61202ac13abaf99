// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source for expiry arithmetic.

use tokio::time::Instant;

/// Source of the current wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock anchored once at construction and advanced by tokio's
/// monotonic [`Instant`].
///
/// Under a paused tokio runtime the clock only moves when the runtime's
/// virtual time moves, so expiry math and timers stay in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor_ms: u64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::starting_at(epoch_ms())
    }

    /// Pin the clock to `epoch_ms` at the current tokio instant.
    pub fn starting_at(epoch_ms: u64) -> Self {
        Self { anchor_ms: epoch_ms, anchor: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.anchor_ms + self.anchor.elapsed().as_millis() as u64
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Signed milliseconds from `now` until `at` (negative once `at` has passed).
pub fn ms_until(at: u64, now: u64) -> i64 {
    at as i64 - now as i64
}

/// Format a millisecond span compactly: `750ms`, `42s`, `3m 20s`, `1d 4h`.
///
/// At most two units are shown, largest first.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }

    let secs = ms / 1000;
    let units = [
        (secs / 86_400, "d"),
        (secs / 3600 % 24, "h"),
        (secs / 60 % 60, "m"),
        (secs % 60, "s"),
    ];

    let parts: Vec<String> = units
        .iter()
        .skip_while(|(n, _)| *n == 0)
        .take(2)
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n}{unit}"))
        .collect();
    parts.join(" ")
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
