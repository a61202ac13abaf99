// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: builders, mocks, and assertion helpers.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::account::{Account, Org};
use crate::client_cache::ClientParams;
use crate::store::{
    CredentialStore, LoginOptions, LogoutScope, StoreError, StoreFactory, StoreFuture,
};

/// Epoch millis used as "now" by most tests.
pub const T0: u64 = 1_700_000_000_000;

/// Account with absolute expiry timestamps.
pub fn account(name: &str, access_expires_at: u64, refresh_expires_at: u64) -> Account {
    Account {
        name: name.to_owned(),
        hash: format!("h-{name}"),
        access_expires_at,
        refresh_expires_at,
        is_default: false,
        org: None,
        orgs: Vec::new(),
    }
}

/// Account whose expiries are relative to `now` (negative = already expired).
pub fn account_in(name: &str, now: u64, access_in_ms: i64, refresh_in_ms: i64) -> Account {
    let at = |delta: i64| now.saturating_add_signed(delta);
    account(name, at(access_in_ms), at(refresh_in_ms))
}

pub fn org(guid: &str, id: &str, name: &str) -> Org {
    Org { guid: guid.to_owned(), id: id.to_owned(), name: name.to_owned() }
}

/// In-memory credential store with scripted responses and call counters.
///
/// `find` answers from the current account list unless a response has been
/// queued with [`MockStore::push_find`].
#[derive(Default)]
pub struct MockStore {
    accounts: Mutex<Vec<Account>>,
    find_script: Mutex<VecDeque<Result<Option<Account>, StoreError>>>,
    login_script: Mutex<VecDeque<Result<Account, StoreError>>>,
    fail_list: AtomicBool,
    token_file: Option<PathBuf>,
    switched: Mutex<Vec<(String, String)>>,
    pub list_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub switch_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self { accounts: Mutex::new(accounts), ..Self::default() }
    }

    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) {
        *self.accounts.lock() = accounts;
    }

    /// Insert or replace by name.
    pub fn upsert(&self, account: Account) {
        let mut accounts = self.accounts.lock();
        match accounts.iter_mut().find(|a| a.name == account.name) {
            Some(slot) => *slot = account,
            None => accounts.push(account),
        }
    }

    pub fn remove(&self, name: &str) {
        self.accounts.lock().retain(|a| a.name != name);
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.lock().clone()
    }

    /// Make `list` fail with `Unavailable` until cleared.
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Queue a one-shot `find` response.
    pub fn push_find(&self, response: Result<Option<Account>, StoreError>) {
        self.find_script.lock().push_back(response);
    }

    /// Queue a one-shot `login` response. Successful logins are added to the
    /// account list.
    pub fn push_login(&self, response: Result<Account, StoreError>) {
        self.login_script.lock().push_back(response);
    }

    /// `(account, org)` pairs passed to `switch_org`, in call order.
    pub fn switched(&self) -> Vec<(String, String)> {
        self.switched.lock().clone()
    }
}

impl CredentialStore for MockStore {
    fn list(&self) -> StoreFuture<'_, Vec<Account>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_list.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("mock list failure".to_owned()))
        } else {
            Ok(self.accounts())
        };
        Box::pin(async move { result })
    }

    fn find<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<Account>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.find_script.lock().pop_front();
        let result = match scripted {
            Some(Ok(Some(account))) => {
                self.upsert(account.clone());
                Ok(Some(account))
            }
            Some(other) => other,
            None => Ok(self.accounts.lock().iter().find(|a| a.name == name).cloned()),
        };
        Box::pin(async move { result })
    }

    fn login<'a>(&'a self, _opts: &'a LoginOptions) -> StoreFuture<'a, Account> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.login_script.lock().pop_front() {
            Some(Ok(account)) => {
                self.upsert(account.clone());
                Ok(account)
            }
            Some(Err(e)) => Err(e),
            None => Err(StoreError::Rejected("no login scripted".to_owned())),
        };
        Box::pin(async move { result })
    }

    fn logout<'a>(&'a self, scope: &'a LogoutScope) -> StoreFuture<'a, Vec<Account>> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        let removed = {
            let mut accounts = self.accounts.lock();
            let (gone, kept): (Vec<Account>, Vec<Account>) =
                accounts.drain(..).partition(|a| match scope {
                    LogoutScope::All => true,
                    LogoutScope::Accounts(names) => names.contains(&a.name),
                });
            *accounts = kept;
            gone
        };
        Box::pin(async move { Ok(removed) })
    }

    fn switch_org<'a>(
        &'a self,
        account: &'a Account,
        org_id: &'a str,
    ) -> StoreFuture<'a, Account> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);
        self.switched.lock().push((account.name.clone(), org_id.to_owned()));
        let result = match account.orgs.iter().find(|o| o.matches(org_id)) {
            Some(org) => {
                let mut updated = account.clone();
                updated.org = Some(org.clone());
                self.upsert(updated.clone());
                Ok(updated)
            }
            None => Err(StoreError::Rejected(format!("unknown org {org_id}"))),
        };
        Box::pin(async move { result })
    }

    fn token_store_file(&self) -> Option<PathBuf> {
        self.token_file.clone()
    }
}

/// Factory that hands out a swappable [`MockStore`] and counts builds.
pub struct MockFactory {
    store: Mutex<Arc<MockStore>>,
    params: Mutex<Vec<ClientParams>>,
}

impl MockFactory {
    pub fn new(store: Arc<MockStore>) -> Self {
        Self { store: Mutex::new(store), params: Mutex::new(Vec::new()) }
    }

    /// Store returned by subsequent builds.
    pub fn set_store(&self, store: Arc<MockStore>) {
        *self.store.lock() = store;
    }

    pub fn builds(&self) -> usize {
        self.params.lock().len()
    }

    /// Parameters of every build, in order.
    pub fn built_with(&self) -> Vec<ClientParams> {
        self.params.lock().clone()
    }
}

impl StoreFactory for MockFactory {
    fn build(&self, params: &ClientParams) -> anyhow::Result<Arc<dyn CredentialStore>> {
        self.params.lock().push(params.clone());
        let store: Arc<dyn CredentialStore> = self.store.lock().clone();
        Ok(store)
    }
}

/// Collects formatted log output on the current thread while alive.
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    _guard: tracing::subscriber::DefaultGuard,
}

impl LogCapture {
    pub fn start() -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(Arc::clone(&sink)))
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self { buf, _guard: guard }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Lines containing every one of `needles`.
    pub fn lines_with(&self, needles: &[&str]) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| needles.iter().all(|n| line.contains(n)))
            .map(str::to_owned)
            .collect()
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Let spawned tasks run to their next await point.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
