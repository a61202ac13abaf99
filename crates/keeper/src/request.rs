// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed requests accepted by [`KeeperService`](crate::service::KeeperService).
//!
//! Each request is validated before it reaches the store.

use serde::Deserialize;

use crate::error::KeeperError;
use crate::store::{LoginOptions, LogoutScope};

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, KeeperError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(KeeperError::missing_parameter(what)),
    }
}

/// Look up one mirrored account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    #[serde(default)]
    pub account_name: Option<String>,
}

impl AccountRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { account_name: Some(name.into()) }
    }

    pub fn validate(&self) -> Result<&str, KeeperError> {
        required(&self.account_name, "account name")
    }
}

/// Credentials and endpoint overrides for a login.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub force: bool,
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub env: Option<String>,
    pub password: Option<String>,
    pub realm: Option<String>,
    pub secret_file: Option<String>,
    pub service_account: bool,
    pub username: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.clone().into_options(), f)
    }
}

impl LoginRequest {
    pub fn into_options(self) -> LoginOptions {
        LoginOptions {
            force: self.force,
            base_url: self.base_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            env: self.env,
            password: self.password,
            realm: self.realm,
            secret_file: self.secret_file,
            service_account: self.service_account,
            username: self.username,
        }
    }
}

/// Revoke one account, or every account when no name is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub account_name: Option<String>,
}

impl LogoutRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn account(name: impl Into<String>) -> Self {
        Self { account_name: Some(name.into()) }
    }

    pub fn scope(&self) -> LogoutScope {
        match self.account_name.as_deref() {
            Some(name) if !name.is_empty() => LogoutScope::Accounts(vec![name.to_owned()]),
            _ => LogoutScope::All,
        }
    }
}

/// Make an account the default and select one of its orgs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRequest {
    #[serde(default)]
    pub account_name: Option<String>,
    /// Org guid, id or name.
    #[serde(default)]
    pub org: Option<String>,
}

impl SwitchRequest {
    pub fn new(account_name: impl Into<String>, org: impl Into<String>) -> Self {
        Self { account_name: Some(account_name.into()), org: Some(org.into()) }
    }

    /// Returns `(account_name, org)`.
    pub fn validate(&self) -> Result<(&str, &str), KeeperError> {
        let name = required(&self.account_name, "account name")?;
        let org = required(&self.org, "org")?;
        Ok((name, org))
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
