// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted key/value settings: a flat JSON object of dotted keys, saved
//! atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;

/// Setting keys read or written by the keeper.
pub mod keys {
    pub const DEFAULT_ACCOUNT: &str = "auth.defaultAccount";
    pub const BASE_URL: &str = "auth.baseUrl";
    pub const CLIENT_ID: &str = "auth.clientId";
    pub const ENV: &str = "auth.env";
    pub const REALM: &str = "auth.realm";
    pub const TOKEN_STORE_DIR: &str = "auth.tokenStoreDir";
    pub const TOKEN_STORE_TYPE: &str = "auth.tokenStoreType";
    pub const CA_FILE: &str = "network.caFile";
    pub const CERT_FILE: &str = "network.certFile";
    pub const KEY_FILE: &str = "network.keyFile";
    pub const PROXY: &str = "network.proxy";
    pub const STRICT_SSL: &str = "network.strictSSL";

    /// Per-account default org: `auth.defaultOrg.<accountHash>`.
    pub fn default_org(account_hash: &str) -> String {
        format!("auth.defaultOrg.{account_hash}")
    }
}

pub struct Settings {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, Value>>,
}

impl Settings {
    /// Settings that are never read from or written to disk.
    pub fn in_memory() -> Self {
        Self { path: None, values: RwLock::new(BTreeMap::new()) }
    }

    /// Load settings from `path`. A missing or empty file yields empty settings.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let values = read_values(path)?;
        Ok(Self { path: Some(path.to_path_buf()), values: RwLock::new(values) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the backing file, replacing every in-memory value.
    pub fn reload(&self) -> anyhow::Result<()> {
        if let Some(ref path) = self.path {
            let values = read_values(path)?;
            *self.values.write() = values;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// String value for `key`; empty strings and non-strings read as unset.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.read().get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.read().get(key).and_then(Value::as_bool)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.values.write().insert(key.to_owned(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    pub fn default_account(&self) -> Option<String> {
        self.get_str(keys::DEFAULT_ACCOUNT)
    }

    /// Write the current values to the backing file. No-op for in-memory settings.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.values.read())?;
        write_atomic(path, &json)
    }
}

fn read_values(path: &Path) -> anyhow::Result<BTreeMap<String, Value>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

/// Write via a uniquely named temp file + rename so concurrent saves never
/// leave a torn file behind.
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
