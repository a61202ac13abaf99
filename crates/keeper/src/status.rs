// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic expiry report for accounts with an armed refresh timer.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::account::Account;
use crate::clock::format_duration;
use crate::refresh::Reconciler;

/// One account's remaining token lifetimes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub account: String,
    pub access_expires_in_ms: i64,
    pub refresh_expires_in_ms: i64,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let refresh = format_duration(self.refresh_expires_in_ms.max(0) as u64);
        if self.access_expires_in_ms <= 0 {
            write!(
                f,
                "{}: access token is expired, refresh token expires in {refresh}",
                self.account
            )
        } else {
            let access = format_duration(self.access_expires_in_ms as u64);
            write!(
                f,
                "{}: access token expires in {access}, refresh token expires in {refresh}",
                self.account
            )
        }
    }
}

/// Build status lines for the accounts that have a live timer and are not
/// about to lapse. Pure; never touches the mirror or the timers.
pub fn status_report(
    accounts: &[Account],
    scheduled: &HashSet<String>,
    now_ms: u64,
    low_water_mark: Duration,
) -> Vec<StatusLine> {
    let low_water = low_water_mark.as_millis() as i64;
    accounts
        .iter()
        .filter(|a| scheduled.contains(&a.name))
        .map(|a| StatusLine {
            account: a.name.clone(),
            access_expires_in_ms: a.access_expires_in(now_ms),
            refresh_expires_in_ms: a.refresh_expires_in(now_ms),
        })
        .filter(|line| line.refresh_expires_in_ms >= low_water)
        .collect()
}

/// Spawn the background reporter. The first report is one full `interval`
/// after start.
pub fn spawn_status_reporter(
    engine: Arc<Reconciler>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut timer = tokio::time::interval_at(start, interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let snapshot = engine.mirror().current();
            let scheduled = engine.timers().names();
            let lines = status_report(
                &snapshot,
                &scheduled,
                engine.now_ms(),
                engine.policy().low_water_mark,
            );
            for line in &lines {
                tracing::info!(account = %line.account, "{line}");
            }
        }
        tracing::debug!("status reporter stopped");
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
