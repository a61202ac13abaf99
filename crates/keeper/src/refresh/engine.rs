// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler: keeps the mirror and the timer table in step with the store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::clock::{format_duration, Clock};
use crate::error::{ErrorCode, KeeperError};
use crate::mirror::AccountMirror;
use crate::refresh::{RefreshPolicy, RefreshTimers};
use crate::settings::Settings;
use crate::store::CredentialStore;

/// How a single scheduling decision resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTransition {
    /// A timer is armed to fire after `delay`.
    Rescheduled { delay: Duration },
    /// Refresh token is below the low-water mark; no timer.
    Lapsed,
    /// The store no longer knows the account.
    Vanished,
    /// The store could not be reached; the schedule is dropped until the next
    /// full reconciliation.
    Failed,
    /// The timer table is closed.
    Closed,
}

/// What one reconciliation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub scheduled: Vec<String>,
    pub lapsed: Vec<String>,
    pub orphans: Vec<String>,
}

/// Orchestrates the mirror, the timer table and the current store.
pub struct Reconciler {
    store: RwLock<Arc<dyn CredentialStore>>,
    settings: Arc<Settings>,
    mirror: AccountMirror,
    timers: RefreshTimers,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    /// Held for the synchronous mirror + timer update.
    gate: Mutex<()>,
    /// Held across list + reconcile so full passes never overlap.
    pass: tokio::sync::Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
        policy: RefreshPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: RwLock::new(store),
            settings,
            mirror: AccountMirror::new(),
            timers: RefreshTimers::new(),
            clock,
            policy,
            gate: Mutex::new(()),
            pass: tokio::sync::Mutex::new(()),
        })
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store.read())
    }

    pub fn mirror(&self) -> &AccountMirror {
        &self.mirror
    }

    pub fn timers(&self) -> &RefreshTimers {
        &self.timers
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Replace the mirror with `fresh` and bring the timer table in line.
    ///
    /// Afterwards exactly the accounts above the low-water mark have a timer.
    pub fn reconcile(self: &Arc<Self>, fresh: Vec<Account>) -> ReconcileOutcome {
        let _gate = self.gate.lock();
        let default_account = self.settings.default_account();
        self.mirror.replace(fresh, default_account.as_deref());
        let snapshot = self.mirror.current();

        let mut outcome = ReconcileOutcome::default();
        for account in snapshot.iter() {
            match self.schedule_account(account) {
                RefreshTransition::Rescheduled { .. } => {
                    outcome.scheduled.push(account.name.clone())
                }
                RefreshTransition::Lapsed => outcome.lapsed.push(account.name.clone()),
                _ => {}
            }
        }

        let present: HashSet<&str> = snapshot.iter().map(|a| a.name.as_str()).collect();
        let mut orphans: Vec<String> =
            self.timers.names().into_iter().filter(|n| !present.contains(n.as_str())).collect();
        orphans.sort();
        for name in &orphans {
            self.timers.cancel(name);
            warn!(account = %name, "removing orphan refresh timer");
        }
        outcome.orphans = orphans;

        debug!(
            accounts = snapshot.len(),
            scheduled = outcome.scheduled.len(),
            lapsed = outcome.lapsed.len(),
            orphans = outcome.orphans.len(),
            "reconciled"
        );
        outcome
    }

    /// Arm (or re-arm) the refresh timer for one account.
    pub fn schedule_account(self: &Arc<Self>, account: &Account) -> RefreshTransition {
        let now = self.clock.now_ms();
        let refresh_in = account.refresh_expires_in(now);
        if self.policy.should_lapse(refresh_in) {
            self.timers.cancel(&account.name);
            info!(
                account = %account.name,
                refresh_expires_in_ms = refresh_in,
                "not enough time left on refresh token, letting account lapse"
            );
            return RefreshTransition::Lapsed;
        }

        let delay = self.policy.delay_for(account.access_expires_in(now));
        let weak = Arc::downgrade(self);
        let name = account.name.clone();
        let armed = self.timers.schedule(&account.name, delay, move || async move {
            if let Some(engine) = weak.upgrade() {
                engine.on_refresh_fired(&name).await;
            }
        });
        if !armed {
            debug!(account = %account.name, "timer table closed, not scheduling");
            return RefreshTransition::Closed;
        }

        debug!(
            account = %account.name,
            delay_ms = delay.as_millis() as u64,
            "scheduled refresh in {}",
            format_duration(delay.as_millis() as u64)
        );
        RefreshTransition::Rescheduled { delay }
    }

    /// Timer callback: re-fetch the account (refreshing it as a side effect)
    /// and schedule the next refresh.
    pub async fn on_refresh_fired(self: &Arc<Self>, name: &str) -> RefreshTransition {
        let store = self.store();
        match store.find(name).await {
            Ok(Some(account)) => self.apply_refreshed(account),
            Ok(None) => {
                warn!(
                    account = %name,
                    code = %ErrorCode::RefreshRace,
                    "refresh fired too late, account vanished"
                );
                RefreshTransition::Vanished
            }
            Err(e) => {
                let err = KeeperError::from(e);
                warn!(
                    account = %name,
                    code = %err.code,
                    err = %err.message,
                    "refresh failed, dropping schedule"
                );
                RefreshTransition::Failed
            }
        }
    }

    fn apply_refreshed(self: &Arc<Self>, account: Account) -> RefreshTransition {
        let _gate = self.gate.lock();
        let default_account = self.settings.default_account();
        if !self.mirror.update(account.clone(), default_account.as_deref()) {
            // A reconciliation removed it while the lookup was in flight.
            warn!(
                account = %account.name,
                code = %ErrorCode::RefreshRace,
                "refreshed account no longer mirrored, not rescheduling"
            );
            return RefreshTransition::Vanished;
        }
        self.schedule_account(&account)
    }

    /// Pull the full list from the store and reconcile against it.
    ///
    /// On failure the previous snapshot and timers are left untouched.
    pub async fn refresh(self: &Arc<Self>) -> Result<ReconcileOutcome, KeeperError> {
        let _pass = self.pass.lock().await;
        let store = self.store();
        match store.list().await {
            Ok(accounts) => Ok(self.reconcile(accounts)),
            Err(e) => {
                let err = KeeperError::from(e);
                warn!(
                    code = %err.code,
                    err = %err.message,
                    "account list failed, keeping previous snapshot"
                );
                Err(err)
            }
        }
    }

    /// Swap in a store built from new client parameters. Every timer belongs
    /// to the old store, so all are cleared before the full resync.
    pub async fn replace_store(
        self: &Arc<Self>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<ReconcileOutcome, KeeperError> {
        {
            let _pass = self.pass.lock().await;
            *self.store.write() = store;
            let cleared = self.timers.cancel_all();
            info!(cleared, "credential store replaced, resynchronising");
        }
        self.refresh().await
    }

    /// Cancel every timer and refuse new ones.
    pub fn close(&self) {
        self.timers.close();
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
