// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store collaborator: the trait the keeper drives, plus a
//! read-only adapter over a JSON token-store file.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::account::Account;
use crate::client_cache::ClientParams;
use crate::clock::Clock;

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors reported by a credential store.
#[derive(Debug)]
pub enum StoreError {
    /// Transient failure reaching the store.
    Unavailable(String),
    /// The store refused the operation (bad credentials, unknown org, ...).
    Rejected(String),
    /// Login found the account already authenticated.
    AlreadyAuthenticated(Box<Account>),
    /// The store does not implement this operation.
    Unsupported(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "credential store unavailable: {msg}"),
            Self::Rejected(msg) => write!(f, "credential store rejected request: {msg}"),
            Self::AlreadyAuthenticated(account) => {
                write!(f, "account \"{}\" already authenticated", account.name)
            }
            Self::Unsupported(op) => write!(f, "credential store does not support {op}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Parameters forwarded to [`CredentialStore::login`].
#[derive(Clone, Default)]
pub struct LoginOptions {
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

impl fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOptions")
            .field("force", &self.force)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("env", &self.env)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("realm", &self.realm)
            .field("secret_file", &self.secret_file)
            .field("service_account", &self.service_account)
            .field("username", &self.username)
            .finish()
    }
}

/// Which accounts a logout revokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutScope {
    All,
    Accounts(Vec<String>),
}

/// The external credential store.
///
/// `list` returns only accounts whose refresh token is still valid. `find`
/// may refresh the access token as a side effect.
pub trait CredentialStore: Send + Sync {
    fn list(&self) -> StoreFuture<'_, Vec<Account>>;

    fn find<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<Account>>;

    fn login<'a>(&'a self, opts: &'a LoginOptions) -> StoreFuture<'a, Account>;

    /// Returns the revoked accounts.
    fn logout<'a>(&'a self, scope: &'a LogoutScope) -> StoreFuture<'a, Vec<Account>>;

    fn switch_org<'a>(&'a self, account: &'a Account, org_id: &'a str)
        -> StoreFuture<'a, Account>;

    /// Backing file to watch for out-of-band changes, if the store is file based.
    fn token_store_file(&self) -> Option<PathBuf> {
        None
    }
}

/// Builds a store from client parameters. Invoked by the client cache only
/// when the parameter fingerprint changes.
pub trait StoreFactory: Send + Sync {
    fn build(&self, params: &ClientParams) -> anyhow::Result<Arc<dyn CredentialStore>>;
}

/// On-disk layout of the token-store file.
#[derive(Debug, Default, Deserialize)]
struct TokenStoreFile {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// Read-only view of a token-store file maintained by another process.
///
/// Never talks to the network: `find` re-reads the file, and mutations are
/// reported as unsupported.
pub struct FileTokenStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileTokenStore {
    pub fn new(path: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { path, clock }
    }

    async fn read(&self) -> Result<Vec<Account>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(StoreError::Unavailable(format!("{}: {e}", self.path.display())));
            }
        };
        if contents.trim().is_empty() {
            return Ok(vec![]);
        }

        let file: TokenStoreFile = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.path.display())))?;

        // Accounts with a dead refresh token are purged by the owning store;
        // hide them until it gets around to it.
        let now = self.clock.now_ms();
        Ok(file
            .accounts
            .into_iter()
            .filter(|a| a.refresh_expires_at > now)
            .map(|mut a| {
                a.is_default = false;
                a
            })
            .collect())
    }
}

impl CredentialStore for FileTokenStore {
    fn list(&self) -> StoreFuture<'_, Vec<Account>> {
        Box::pin(self.read())
    }

    fn find<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<Account>> {
        Box::pin(async move { Ok(self.read().await?.into_iter().find(|a| a.name == name)) })
    }

    fn login<'a>(&'a self, _opts: &'a LoginOptions) -> StoreFuture<'a, Account> {
        Box::pin(async { Err(StoreError::Unsupported("login")) })
    }

    fn logout<'a>(&'a self, _scope: &'a LogoutScope) -> StoreFuture<'a, Vec<Account>> {
        Box::pin(async { Err(StoreError::Unsupported("logout")) })
    }

    fn switch_org<'a>(
        &'a self,
        _account: &'a Account,
        _org_id: &'a str,
    ) -> StoreFuture<'a, Account> {
        Box::pin(async { Err(StoreError::Unsupported("switch")) })
    }

    fn token_store_file(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// Builds [`FileTokenStore`]s rooted at the configured token-store directory.
pub struct FileStoreFactory {
    clock: Arc<dyn Clock>,
}

impl FileStoreFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl StoreFactory for FileStoreFactory {
    fn build(&self, params: &ClientParams) -> anyhow::Result<Arc<dyn CredentialStore>> {
        if let Some(ref kind) = params.token_store_type {
            if kind != "file" {
                anyhow::bail!("unsupported token store type: {kind}");
            }
        }
        let path = params.token_store_file();
        tracing::info!(path = %path.display(), "using token store file");
        Ok(Arc::new(FileTokenStore::new(path, Arc::clone(&self.clock))))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
