// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One cancellable refresh timer per account name.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct TimerEntry {
    id: u64,
    delay: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

/// Read-only view of a live schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleInfo {
    pub delay: Duration,
    pub deadline: Instant,
}

/// Table of armed refresh timers keyed by account name.
///
/// Scheduling a name that already has a timer cancels the old one first, so
/// at most one timer per name is ever armed. A timer removes its own entry
/// before its callback runs.
pub struct RefreshTimers {
    entries: Arc<Mutex<HashMap<String, TimerEntry>>>,
    next_id: AtomicU64,
    closed: CancellationToken,
}

impl Default for RefreshTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshTimers {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            closed: CancellationToken::new(),
        }
    }

    /// Arm a timer that runs `on_fire` once after `delay`.
    ///
    /// Returns false if the table has been closed. Must be called from within
    /// a tokio runtime.
    pub fn schedule<F, Fut>(&self, name: &str, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.closed.child_token();
        {
            let mut entries = self.entries.lock();
            // Checked under the lock so close() and schedule() cannot interleave.
            if self.closed.is_cancelled() {
                return false;
            }
            let entry =
                TimerEntry { id, delay, deadline: Instant::now() + delay, cancel: cancel.clone() };
            if let Some(old) = entries.insert(name.to_owned(), entry) {
                old.cancel.cancel();
            }
        }

        let entries = Arc::clone(&self.entries);
        let name = name.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut entries = entries.lock();
                match entries.get(&name) {
                    Some(e) if e.id == id && !e.cancel.is_cancelled() => {
                        entries.remove(&name);
                    }
                    // Replaced or cancelled while we were waking up.
                    _ => return,
                }
            }
            on_fire().await;
        });
        true
    }

    /// Cancel and remove the timer for `name`. No-op if none is armed.
    pub fn cancel(&self, name: &str) -> bool {
        match self.entries.lock().remove(name) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every armed timer. The table stays usable.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<TimerEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.cancel.cancel();
        }
        drained.len()
    }

    /// Cancel every armed timer and refuse any further schedules.
    pub fn close(&self) {
        let mut entries = self.entries.lock();
        // Cancels every entry token too; they are all children of `closed`.
        self.closed.cancel();
        entries.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn names(&self) -> HashSet<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<ScheduleInfo> {
        self.entries
            .lock()
            .get(name)
            .map(|e| ScheduleInfo { delay: e.delay, deadline: e.deadline })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Drop for RefreshTimers {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
#[path = "timers_tests.rs"]
mod tests;
