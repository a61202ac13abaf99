// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-known account snapshot, observable through a `watch` channel.

use std::sync::Arc;

use tokio::sync::watch;

use crate::account::Account;
use crate::error::KeeperError;

/// Shared, immutable account list as last observed from the store.
pub type Snapshot = Arc<Vec<Account>>;

/// Read-through mirror of the store's account list.
///
/// Reads never touch the store; the reconciler is the only writer.
pub struct AccountMirror {
    tx: watch::Sender<Snapshot>,
}

impl Default for AccountMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountMirror {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        Self { tx }
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Snapshot {
        Arc::clone(&self.tx.borrow())
    }

    /// Replace the snapshot wholesale, preserving order and recomputing the
    /// default flag from `default_account`.
    pub fn replace(&self, accounts: Vec<Account>, default_account: Option<&str>) {
        let accounts = accounts
            .into_iter()
            .map(|mut a| {
                a.is_default = default_account == Some(a.name.as_str());
                a
            })
            .collect();
        self.tx.send_replace(Arc::new(accounts));
    }

    /// Swap in a refreshed copy of an account already in the snapshot.
    ///
    /// Returns false (and changes nothing) if the account is not mirrored;
    /// a vanished account is only re-added by a full reconciliation.
    pub fn update(&self, mut account: Account, default_account: Option<&str>) -> bool {
        account.is_default = default_account == Some(account.name.as_str());
        self.tx.send_if_modified(|snapshot| {
            let Some(idx) = snapshot.iter().position(|a| a.name == account.name) else {
                return false;
            };
            let mut next = Vec::clone(snapshot);
            next[idx] = account;
            *snapshot = Arc::new(next);
            true
        })
    }

    pub fn get(&self, name: &str) -> Option<Account> {
        self.tx.borrow().iter().find(|a| a.name == name).cloned()
    }

    /// Resolve an account by name.
    pub fn lookup(&self, name: Option<&str>) -> Result<Account, KeeperError> {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(KeeperError::missing_parameter("account name")),
        };
        self.get(name).ok_or_else(|| KeeperError::account_not_found(name))
    }

    /// The account flagged as default, if any.
    pub fn default_account(&self) -> Option<Account> {
        self.tx.borrow().iter().find(|a| a.is_default).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tx.borrow().iter().map(|a| a.name.clone()).collect()
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
