// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account model mirrored from the credential store.

use serde::{Deserialize, Serialize};

use crate::clock::ms_until;

/// An organization membership. Passed through untouched except for switch
/// matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub guid: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Org {
    /// True if `needle` names this org by guid, id, or display name.
    pub fn matches(&self, needle: &str) -> bool {
        self.guid == needle || (!self.id.is_empty() && self.id == needle) || self.name == needle
    }
}

/// One authenticated credential known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique, stable across refreshes.
    pub name: String,
    /// Store-assigned hash used to key per-account settings.
    #[serde(default)]
    pub hash: String,
    /// Access token expiry, epoch millis.
    pub access_expires_at: u64,
    /// Refresh token expiry, epoch millis.
    pub refresh_expires_at: u64,
    /// Derived from the `auth.defaultAccount` setting; never read from the store.
    #[serde(rename = "default", default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Org>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orgs: Vec<Org>,
}

impl Account {
    pub fn access_expires_in(&self, now_ms: u64) -> i64 {
        ms_until(self.access_expires_at, now_ms)
    }

    pub fn refresh_expires_in(&self, now_ms: u64) -> i64 {
        ms_until(self.refresh_expires_at, now_ms)
    }

    /// Look up one of this account's orgs by guid, id, or name.
    pub fn find_org(&self, needle: &str) -> Option<&Org> {
        self.orgs.iter().find(|o| o.matches(needle))
    }

    /// Guid of the currently selected org, if any.
    pub fn org_guid(&self) -> Option<&str> {
        self.org.as_ref().map(|o| o.guid.as_str())
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
