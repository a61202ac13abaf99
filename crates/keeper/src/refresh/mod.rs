// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proactive access-token refresh: the timer table and the reconciler that
//! keeps it in step with the credential store.

pub mod engine;
pub mod timers;

use std::time::Duration;

pub use engine::{ReconcileOutcome, Reconciler, RefreshTransition};
pub use timers::{RefreshTimers, ScheduleInfo};

/// Tunables shared by every scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Floor applied to every computed delay; keeps stale accounts from
    /// re-entering the scheduler in a tight loop.
    pub min_delay: Duration,
    /// Remaining refresh-token lifetime below which an account is left to lapse.
    pub low_water_mark: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self { min_delay: Duration::from_millis(100), low_water_mark: Duration::from_millis(1000) }
    }
}

impl RefreshPolicy {
    /// Delay until the access token should be refreshed, floored at `min_delay`.
    pub fn delay_for(&self, access_expires_in_ms: i64) -> Duration {
        let wanted = Duration::from_millis(access_expires_in_ms.max(0) as u64);
        wanted.max(self.min_delay)
    }

    /// True if the refresh token has too little life left to bother.
    pub fn should_lapse(&self, refresh_expires_in_ms: i64) -> bool {
        refresh_expires_in_ms < self.low_water_mark.as_millis() as i64
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
