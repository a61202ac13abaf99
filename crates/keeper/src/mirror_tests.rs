// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ErrorCode;
use crate::test_support::account;

#[test]
fn replace_preserves_order_and_marks_default() {
    let mirror = AccountMirror::new();
    mirror.replace(vec![account("b", 10, 100), account("a", 10, 100)], Some("a"));

    assert_eq!(mirror.names(), vec!["b", "a"]);
    let current = mirror.current();
    assert!(!current[0].is_default);
    assert!(current[1].is_default);
    assert_eq!(mirror.default_account().map(|a| a.name), Some("a".to_owned()));
}

#[test]
fn replace_clears_stale_default_flags() {
    let mirror = AccountMirror::new();
    mirror.replace(vec![account("a", 10, 100)], Some("a"));
    mirror.replace(vec![account("a", 10, 100)], None);
    assert!(mirror.default_account().is_none());
}

#[yare::parameterized(
    absent = { None, ErrorCode::MissingParameter },
    empty  = { Some(""), ErrorCode::MissingParameter },
    ghost  = { Some("ghost"), ErrorCode::NotFound },
)]
fn lookup_errors(name: Option<&str>, expected: ErrorCode) {
    let mirror = AccountMirror::new();
    mirror.replace(vec![account("a", 10, 100)], None);
    let err = mirror.lookup(name).err().map(|e| e.code);
    assert_eq!(err, Some(expected));
}

#[test]
fn lookup_finds_mirrored_account() -> anyhow::Result<()> {
    let mirror = AccountMirror::new();
    mirror.replace(vec![account("a", 10, 100)], None);
    assert_eq!(mirror.lookup(Some("a"))?.name, "a");
    Ok(())
}

#[test]
fn update_replaces_in_place_only_when_present() {
    let mirror = AccountMirror::new();
    mirror.replace(vec![account("a", 10, 100), account("b", 10, 100)], Some("b"));

    let refreshed = account("b", 5_000, 100);
    assert!(mirror.update(refreshed, Some("b")));
    let current = mirror.current();
    assert_eq!(current[1].access_expires_at, 5_000);
    assert!(current[1].is_default);

    assert!(!mirror.update(account("ghost", 1, 1), None));
    assert_eq!(mirror.names(), vec!["a", "b"]);
}

#[tokio::test]
async fn subscribers_see_replacements() -> anyhow::Result<()> {
    let mirror = AccountMirror::new();
    let mut rx = mirror.subscribe();

    mirror.replace(vec![account("a", 10, 100)], None);
    rx.changed().await?;
    assert_eq!(rx.borrow_and_update().len(), 1);
    Ok(())
}
