// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::Ordering;

use super::*;
use crate::clock::SystemClock;
use crate::error::ErrorCode;
use crate::test_support::{account_in, org, MockFactory, MockStore, T0};

fn config() -> KeeperConfig {
    KeeperConfig { data_dir: Some(PathBuf::from("/nonexistent")), ..KeeperConfig::default() }
}

type Activated = (Arc<KeeperService>, Arc<MockFactory>);

async fn activate(store: &Arc<MockStore>) -> anyhow::Result<Activated> {
    activate_with_settings(store, Settings::in_memory()).await
}

async fn activate_with_settings(
    store: &Arc<MockStore>,
    settings: Settings,
) -> anyhow::Result<Activated> {
    let factory = Arc::new(MockFactory::new(Arc::clone(store)));
    let service = KeeperService::activate_with(
        &config(),
        Arc::new(settings),
        Arc::clone(&factory) as Arc<dyn StoreFactory>,
        Arc::new(SystemClock::starting_at(T0)),
    )
    .await?;
    Ok((service, factory))
}

fn with_orgs(mut account: Account) -> Account {
    account.orgs = vec![org("g-acme", "100", "Acme"), org("g-beta", "200", "Beta")];
    account.org = Some(account.orgs[0].clone());
    account
}

// ── activation ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn activation_mirrors_and_schedules() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::with_accounts(vec![
        account_in("a", T0, 60_000, 3_600_000),
        account_in("b", T0, 60_000, 500),
    ]));
    let (service, factory) = activate(&store).await?;

    assert_eq!(factory.builds(), 1);
    assert_eq!(service.current_accounts().len(), 2);
    assert!(service.engine().timers().contains("a"));
    assert!(!service.engine().timers().contains("b"));

    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activation_survives_unavailable_store() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::new());
    store.fail_list(true);
    let (service, _) = activate(&store).await?;
    assert!(service.current_accounts().is_empty());

    store.fail_list(false);
    store.set_accounts(vec![account_in("a", T0, 60_000, 3_600_000)]);
    service.reconcile_now().await?;
    assert_eq!(service.current_accounts().len(), 1);
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn activation_rejects_invalid_config() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::new());
    let factory: Arc<dyn StoreFactory> = Arc::new(MockFactory::new(store));
    let bad = KeeperConfig { min_delay_ms: 0, ..config() };
    let result = KeeperService::activate_with(
        &bad,
        Arc::new(Settings::in_memory()),
        factory,
        Arc::new(SystemClock::starting_at(T0)),
    )
    .await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_all_callbacks() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::with_accounts(vec![account_in("a", T0, 500, 3_600_000)]));
    let (service, _) = activate(&store).await?;
    assert!(service.engine().timers().contains("a"));

    service.shutdown().await;
    assert!(service.is_shut_down());
    assert!(service.engine().timers().is_empty());

    tokio::time::sleep(Duration::from_secs(600)).await;
    crate::test_support::settle().await;
    assert_eq!(store.find_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

// ── lookups ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn lookup_and_active_account_use_the_mirror() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::with_accounts(vec![
        account_in("a", T0, 60_000, 3_600_000),
        account_in("b", T0, 60_000, 3_600_000),
    ]));
    let settings = Settings::in_memory();
    settings.set(keys::DEFAULT_ACCOUNT, "b");
    let (service, _) = activate_with_settings(&store, settings).await?;
    let lists = store.list_calls.load(Ordering::SeqCst);

    assert_eq!(service.lookup_account(&AccountRequest::new("a"))?.name, "a");
    assert_eq!(service.active_account().map(|a| a.name), Some("b".to_owned()));
    crate::assert_err_contains!(
        service.lookup_account(&AccountRequest::default()),
        "Missing account name"
    );
    crate::assert_err_contains!(
        service.lookup_account(&AccountRequest::new("ghost")),
        "Account \"ghost\" not found"
    );
    assert_eq!(store.list_calls.load(Ordering::SeqCst), lists);
    service.shutdown().await;
    Ok(())
}

// ── login ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn login_schedules_records_default_org_and_resyncs() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::new());
    let (service, _) = activate(&store).await?;

    let fresh = with_orgs(account_in("alice", T0, 60_000, 3_600_000));
    store.push_login(Ok(fresh.clone()));
    let account = service.login(LoginRequest::default()).await?;

    assert_eq!(account.name, "alice");
    assert!(service.engine().timers().contains("alice"));
    assert_eq!(service.current_accounts().len(), 1);
    assert_eq!(
        service.settings().get_str(&keys::default_org(&fresh.hash)).as_deref(),
        Some("g-acme")
    );
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn login_without_resync_leaves_account_unscheduled() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::new());
    let (service, _) = activate(&store).await?;

    store.fail_list(true);
    store.push_login(Ok(account_in("alice", T0, 60_000, 3_600_000)));
    let account = service.login(LoginRequest::default()).await?;
    assert_eq!(account.name, "alice");
    assert!(service.current_accounts().is_empty());
    assert!(service.engine().timers().is_empty());

    store.fail_list(false);
    service.reconcile_now().await?;
    assert!(service.engine().timers().contains("alice"));
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn login_keeps_existing_default_org() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::new());
    let settings = Settings::in_memory();
    let fresh = with_orgs(account_in("alice", T0, 60_000, 3_600_000));
    settings.set(&keys::default_org(&fresh.hash), "g-beta");
    let (service, _) = activate_with_settings(&store, settings).await?;

    store.push_login(Ok(fresh.clone()));
    service.login(LoginRequest::default()).await?;
    assert_eq!(
        service.settings().get_str(&keys::default_org(&fresh.hash)).as_deref(),
        Some("g-beta")
    );
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn already_authenticated_counts_as_success() -> anyhow::Result<()> {
    let existing = account_in("alice", T0, 60_000, 3_600_000);
    let store = Arc::new(MockStore::with_accounts(vec![existing.clone()]));
    let (service, _) = activate(&store).await?;

    store.push_login(Err(StoreError::AlreadyAuthenticated(Box::new(existing))));
    let account = service.login(LoginRequest::default()).await?;
    assert_eq!(account.name, "alice");
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_login_is_reported() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::new());
    let (service, _) = activate(&store).await?;

    store.push_login(Err(StoreError::Rejected("bad password".to_owned())));
    let err = service.login(LoginRequest::default()).await.err();
    assert_eq!(err.map(|e| e.code), Some(ErrorCode::StoreRejected));
    service.shutdown().await;
    Ok(())
}

// ── logout ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn logout_one_account_resyncs_after_mutation() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::with_accounts(vec![
        account_in("a", T0, 60_000, 3_600_000),
        account_in("b", T0, 60_000, 3_600_000),
    ]));
    let (service, _) = activate(&store).await?;

    let revoked = service.logout(LogoutRequest::account("a")).await?;
    assert_eq!(revoked.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(service.engine().mirror().names(), vec!["b"]);
    assert!(!service.engine().timers().contains("a"));
    assert!(service.engine().timers().contains("b"));
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn logout_all_clears_everything() -> anyhow::Result<()> {
    let store = Arc::new(MockStore::with_accounts(vec![
        account_in("a", T0, 60_000, 3_600_000),
        account_in("b", T0, 60_000, 3_600_000),
    ]));
    let (service, _) = activate(&store).await?;

    let revoked = service.logout(LogoutRequest::all()).await?;
    assert_eq!(revoked.len(), 2);
    assert!(service.current_accounts().is_empty());
    assert!(service.engine().timers().is_empty());
    service.shutdown().await;
    Ok(())
}

// ── switch ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn switch_changes_org_and_default() -> anyhow::Result<()> {
    let alice = with_orgs(account_in("alice", T0, 60_000, 3_600_000));
    let store = Arc::new(MockStore::with_accounts(vec![
        alice.clone(),
        account_in("bob", T0, 60_000, 3_600_000),
    ]));
    let (service, _) = activate(&store).await?;

    let switched = service.switch(SwitchRequest::new("alice", "Beta")).await?;
    assert_eq!(switched.org_guid(), Some("g-beta"));
    assert_eq!(store.switched(), vec![("alice".to_owned(), "200".to_owned())]);
    assert_eq!(service.settings().default_account().as_deref(), Some("alice"));
    assert_eq!(
        service.settings().get_str(&keys::default_org(&alice.hash)).as_deref(),
        Some("g-beta")
    );
    assert_eq!(service.active_account().map(|a| a.name), Some("alice".to_owned()));
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn switch_to_current_org_skips_store() -> anyhow::Result<()> {
    let alice = with_orgs(account_in("alice", T0, 60_000, 3_600_000));
    let store = Arc::new(MockStore::with_accounts(vec![alice]));
    let (service, _) = activate(&store).await?;

    service.switch(SwitchRequest::new("alice", "g-acme")).await?;
    assert_eq!(store.switch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(service.settings().default_account().as_deref(), Some("alice"));
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn switch_errors() -> anyhow::Result<()> {
    let empty = Arc::new(MockStore::new());
    let (service, _) = activate(&empty).await?;
    crate::assert_err_contains!(
        service.switch(SwitchRequest::new("alice", "Acme")).await,
        "No authenticated accounts found"
    );
    crate::assert_err_contains!(
        service.switch(SwitchRequest { account_name: Some("alice".to_owned()), org: None }).await,
        "Missing org"
    );
    service.shutdown().await;

    let store = Arc::new(MockStore::with_accounts(vec![with_orgs(account_in(
        "alice", T0, 60_000, 3_600_000,
    ))]));
    let (service, _) = activate(&store).await?;
    crate::assert_err_contains!(
        service.switch(SwitchRequest::new("bob", "Acme")).await,
        "Account \"bob\" not found"
    );
    crate::assert_err_contains!(
        service.switch(SwitchRequest::new("alice", "Nowhere")).await,
        "Unable to find organization \"Nowhere\""
    );
    assert!(service.settings().default_account().is_none());
    service.shutdown().await;
    Ok(())
}

// ── settings reload ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unrelated_settings_change_keeps_client() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"network.proxy":"p1"}"#)?;
    let store = Arc::new(MockStore::with_accounts(vec![account_in("a", T0, 60_000, 3_600_000)]));
    let (service, factory) = activate_with_settings(&store, Settings::load(&path)?).await?;

    std::fs::write(&path, r#"{"network.proxy":"p1","auth.defaultAccount":"a"}"#)?;
    assert!(!service.reload_settings().await?);
    assert_eq!(factory.builds(), 1);
    assert_eq!(service.active_account().map(|a| a.name), Some("a".to_owned()));
    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn client_params_change_rebuilds_and_resyncs() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"network.proxy":"p1"}"#)?;
    let old = Arc::new(MockStore::with_accounts(vec![account_in("a", T0, 60_000, 3_600_000)]));
    let (service, factory) = activate_with_settings(&old, Settings::load(&path)?).await?;

    let new = Arc::new(MockStore::with_accounts(vec![account_in("c", T0, 60_000, 3_600_000)]));
    factory.set_store(Arc::clone(&new));
    std::fs::write(&path, r#"{"network.proxy":"p2"}"#)?;

    assert!(service.reload_settings().await?);
    assert_eq!(factory.builds(), 2);
    assert_eq!(factory.built_with()[1].proxy.as_deref(), Some("p2"));
    assert_eq!(service.engine().mirror().names(), vec!["c"]);
    assert_eq!(service.engine().timers().names().into_iter().collect::<Vec<_>>(), vec!["c"]);
    service.shutdown().await;
    Ok(())
}
