// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint-gated client cache.
//!
//! Building a store client is comparatively expensive and has side effects,
//! so the parameters it is built from are canonicalised (sorted-key JSON) and
//! hashed with 64-bit FNV-1a. A client is rebuilt only when that fingerprint
//! changes; unrelated settings edits leave the cached client in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::{keys, Settings};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// File name of the token store inside the token-store directory.
pub const TOKEN_STORE_FILE_NAME: &str = "tokens.json";

/// Connection and auth parameters a store client is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientParams {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub env: Option<String>,
    pub realm: Option<String>,
    pub token_store_dir: Option<PathBuf>,
    pub token_store_type: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub proxy: Option<String>,
    #[serde(rename = "strictSSL")]
    pub strict_ssl: Option<bool>,
    pub home_dir: Option<PathBuf>,
}

impl ClientParams {
    /// Collect client parameters from persisted settings.
    pub fn from_settings(settings: &Settings, home_dir: Option<&Path>) -> Self {
        Self {
            base_url: settings.get_str(keys::BASE_URL),
            client_id: settings.get_str(keys::CLIENT_ID),
            env: settings.get_str(keys::ENV),
            realm: settings.get_str(keys::REALM),
            token_store_dir: settings.get_str(keys::TOKEN_STORE_DIR).map(PathBuf::from),
            token_store_type: settings.get_str(keys::TOKEN_STORE_TYPE),
            ca_file: settings.get_str(keys::CA_FILE).map(PathBuf::from),
            cert_file: settings.get_str(keys::CERT_FILE).map(PathBuf::from),
            key_file: settings.get_str(keys::KEY_FILE).map(PathBuf::from),
            proxy: settings.get_str(keys::PROXY),
            strict_ssl: settings.get_bool(keys::STRICT_SSL),
            home_dir: home_dir.map(Path::to_path_buf),
        }
    }

    /// Token-store file: `<tokenStoreDir>/tokens.json`, falling back to the
    /// home dir, then the working directory.
    pub fn token_store_file(&self) -> PathBuf {
        let dir = self
            .token_store_dir
            .as_deref()
            .or(self.home_dir.as_deref())
            .unwrap_or_else(|| Path::new("."));
        dir.join(TOKEN_STORE_FILE_NAME)
    }
}

/// 64-bit FNV-1a over `bytes`.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Serialize `value` to compact JSON with every object's keys sorted.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    let value = sort_keys(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&value)?)
}

/// Fingerprint of the canonical form of `value`.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<u64> {
    Ok(fnv1a(canonical_json(value)?.as_bytes()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            // Rebuild in sorted order so the result does not depend on whether
            // serde_json preserves insertion order.
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Result of [`ClientCache::get_or_create`].
pub struct Cached<C: ?Sized> {
    pub client: Arc<C>,
    /// True when a new client was built for a new fingerprint.
    pub changed: bool,
    pub fingerprint: u64,
}

struct CacheSlot<C: ?Sized> {
    fingerprint: u64,
    client: Arc<C>,
}

/// Single-slot cache keyed by parameter fingerprint.
pub struct ClientCache<C: ?Sized> {
    slot: Option<CacheSlot<C>>,
}

impl<C: ?Sized> Default for ClientCache<C> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<C: ?Sized> ClientCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(&self) -> Option<u64> {
        self.slot.as_ref().map(|s| s.fingerprint)
    }

    pub fn current(&self) -> Option<Arc<C>> {
        self.slot.as_ref().map(|s| Arc::clone(&s.client))
    }

    /// Return the cached client if `params` fingerprint the same as last time,
    /// otherwise build, cache, and return a new one.
    ///
    /// A failed build leaves the previous slot untouched.
    pub fn get_or_create<P, F>(&mut self, params: &P, build: F) -> anyhow::Result<Cached<C>>
    where
        P: Serialize + ?Sized,
        F: FnOnce(&P) -> anyhow::Result<Arc<C>>,
    {
        let fingerprint = fingerprint(params)?;
        if let Some(ref slot) = self.slot {
            if slot.fingerprint == fingerprint {
                return Ok(Cached { client: Arc::clone(&slot.client), changed: false, fingerprint });
            }
        }

        let client = build(params)?;
        match self.fingerprint() {
            Some(prev) => tracing::info!(
                "client param fingerprint changed ({fingerprint:016x} != {prev:016x}), built new client"
            ),
            None => tracing::info!("built client for fingerprint {fingerprint:016x}"),
        }
        self.slot = Some(CacheSlot { fingerprint, client: Arc::clone(&client) });
        Ok(Cached { client, changed: true, fingerprint })
    }
}

#[cfg(test)]
#[path = "client_cache_tests.rs"]
mod tests;
