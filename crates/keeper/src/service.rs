// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keeper service: owns the reconciler, the client cache and the background
//! tasks for one activation, and exposes the operations the routing layer
//! calls.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::client_cache::{ClientCache, ClientParams};
use crate::clock::Clock;
use crate::config::KeeperConfig;
use crate::error::KeeperError;
use crate::mirror::Snapshot;
use crate::refresh::{ReconcileOutcome, Reconciler};
use crate::request::{AccountRequest, LoginRequest, LogoutRequest, SwitchRequest};
use crate::settings::{keys, Settings};
use crate::status::spawn_status_reporter;
use crate::store::{CredentialStore, StoreError, StoreFactory};
use crate::watch::FileWatcher;

/// One activation of the keeper. Dropping or [`shutdown`](Self::shutdown)
/// stops every timer and background task.
pub struct KeeperService {
    engine: Arc<Reconciler>,
    settings: Arc<Settings>,
    cache: Mutex<ClientCache<dyn CredentialStore>>,
    factory: Arc<dyn StoreFactory>,
    data_dir: Option<PathBuf>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KeeperService {
    /// Load settings from the configured path and activate.
    pub async fn activate(
        config: &KeeperConfig,
        factory: Arc<dyn StoreFactory>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Arc<Self>> {
        let settings_path = config.settings_path();
        let settings = Settings::load(&settings_path)?;
        info!(path = %settings_path.display(), "loaded settings");
        Self::activate_with(config, Arc::new(settings), factory, clock).await
    }

    /// Activate against already-loaded settings.
    ///
    /// Builds the store client, runs the first reconciliation, then starts the
    /// file watchers and the status reporter.
    pub async fn activate_with(
        config: &KeeperConfig,
        settings: Arc<Settings>,
        factory: Arc<dyn StoreFactory>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Arc<Self>> {
        config.validate()?;
        let data_dir = Some(config.data_dir());

        let mut cache = ClientCache::new();
        let params = ClientParams::from_settings(&settings, data_dir.as_deref());
        let cached = cache.get_or_create(&params, |p| factory.build(p))?;
        let store = cached.client;

        let engine =
            Reconciler::new(Arc::clone(&store), Arc::clone(&settings), clock, config.policy());
        let service = Arc::new(Self {
            engine: Arc::clone(&engine),
            settings: Arc::clone(&settings),
            cache: Mutex::new(cache),
            factory,
            data_dir,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        // A failed first pass is logged by the engine; watchers will retry.
        let _ = engine.refresh().await;

        let mut tasks = Vec::new();
        match store.token_store_file() {
            Some(path) => {
                info!(path = %path.display(), "watching token store");
                let weak = Arc::downgrade(&service);
                tasks.push(FileWatcher::new(vec![path], config.debounce()).spawn(
                    service.shutdown.child_token(),
                    move || {
                        let weak = weak.clone();
                        async move {
                            if let Some(service) = weak.upgrade() {
                                debug!("token store changed");
                                let _ = service.engine.refresh().await;
                            }
                        }
                    },
                ));
            }
            None => warn!(
                "token store is not file based, accounts only resync after login, logout or switch"
            ),
        }

        if let Some(path) = settings.path() {
            let weak = Arc::downgrade(&service);
            tasks.push(FileWatcher::new(vec![path.to_path_buf()], config.debounce()).spawn(
                service.shutdown.child_token(),
                move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(service) = weak.upgrade() {
                            if let Err(e) = service.reload_settings().await {
                                warn!(err = %e, "settings reload failed");
                            }
                        }
                    }
                },
            ));
        }

        tasks.push(spawn_status_reporter(
            Arc::clone(&engine),
            config.status_interval(),
            service.shutdown.child_token(),
        ));
        *service.tasks.lock() = tasks;

        info!(accounts = engine.mirror().current().len(), "keeper activated");
        Ok(service)
    }

    pub fn engine(&self) -> &Arc<Reconciler> {
        &self.engine
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Force an immediate resync with the store.
    pub async fn reconcile_now(&self) -> Result<ReconcileOutcome, KeeperError> {
        self.engine.refresh().await
    }

    pub fn current_accounts(&self) -> Snapshot {
        self.engine.mirror().current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.engine.mirror().subscribe()
    }

    pub fn lookup_account(&self, req: &AccountRequest) -> Result<Account, KeeperError> {
        self.engine.mirror().lookup(req.account_name.as_deref())
    }

    /// The account flagged as default, if any.
    pub fn active_account(&self) -> Option<Account> {
        self.engine.mirror().default_account()
    }

    /// Log in, treating an already-authenticated account as success.
    ///
    /// The new account is only scheduled once the resync has mirrored it.
    pub async fn login(&self, req: LoginRequest) -> Result<Account, KeeperError> {
        let opts = req.into_options();
        let store = self.engine.store();
        let account = match store.login(&opts).await {
            Ok(account) => account,
            Err(StoreError::AlreadyAuthenticated(account)) => {
                info!(account = %account.name, "account already authenticated");
                *account
            }
            Err(e) => return Err(e.into()),
        };

        let key = keys::default_org(&account.hash);
        if self.settings.get_str(&key).is_none() {
            if let Some(guid) = account.org_guid() {
                self.settings.set(&key, guid);
                self.save_settings();
            }
        }

        self.resync_after_mutation().await;
        Ok(account)
    }

    /// Revoke one account or all of them. Returns the revoked accounts.
    pub async fn logout(&self, req: LogoutRequest) -> Result<Vec<Account>, KeeperError> {
        let scope = req.scope();
        let revoked = self.engine.store().logout(&scope).await?;
        info!(revoked = revoked.len(), "logged out");
        self.resync_after_mutation().await;
        Ok(revoked)
    }

    /// Make an account the default, switching its org first if needed.
    pub async fn switch(&self, req: SwitchRequest) -> Result<Account, KeeperError> {
        let (name, org_needle) = req.validate()?;
        let store = self.engine.store();

        let accounts = store.list().await?;
        if accounts.is_empty() {
            return Err(KeeperError::no_accounts());
        }
        let mut account = accounts
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| KeeperError::account_not_found(name))?;
        let org = account
            .find_org(org_needle)
            .cloned()
            .ok_or_else(|| KeeperError::org_not_found(org_needle))?;

        if account.org_guid() != Some(org.guid.as_str()) {
            let org_id = if org.id.is_empty() { &org.guid } else { &org.id };
            account = store.switch_org(&account, org_id).await?;
            info!(account = %account.name, org = %org.guid, "switched org");
        }

        self.settings.set(keys::DEFAULT_ACCOUNT, account.name.clone());
        self.settings.set(&keys::default_org(&account.hash), org.guid.clone());
        self.save_settings();

        self.resync_after_mutation().await;
        Ok(account)
    }

    /// Re-read settings and rebuild the store client if its parameters
    /// changed. Returns true if a new client was built.
    pub async fn reload_settings(&self) -> anyhow::Result<bool> {
        self.settings.reload()?;
        let params = ClientParams::from_settings(&self.settings, self.data_dir.as_deref());
        let cached = {
            let mut cache = self.cache.lock();
            cache.get_or_create(&params, |p| self.factory.build(p))?
        };

        if cached.changed {
            if cached.client.token_store_file().is_none() {
                warn!("new token store is not file based, accounts only resync on request");
            }
            let _ = self.engine.replace_store(cached.client).await;
        } else {
            let _ = self.engine.refresh().await;
        }
        Ok(cached.changed)
    }

    /// Stop every timer and background task. No callback fires afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.engine.close();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                warn!("background task did not stop in time");
            }
        }
        info!("keeper stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn resync_after_mutation(&self) {
        if let Err(e) = self.engine.refresh().await {
            debug!(err = %e, "resync after mutation failed");
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save() {
            warn!(err = %e, "failed to save settings");
        }
    }
}

impl Drop for KeeperService {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.engine.close();
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
