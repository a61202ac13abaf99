// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::refresh::RefreshPolicy;

/// Keeps stored credentials refreshed ahead of expiry.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "authkeeper", version, about)]
pub struct KeeperConfig {
    /// Path to the persisted settings JSON file.
    #[arg(long, env = "AUTHKEEPER_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Fallback directory for the token store when `auth.tokenStoreDir` is unset.
    #[arg(long, env = "AUTHKEEPER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Floor for every refresh delay, in milliseconds.
    #[arg(long, default_value_t = 100, env = "AUTHKEEPER_MIN_DELAY_MS")]
    pub min_delay_ms: u64,

    /// Accounts whose refresh token expires sooner than this are left to lapse.
    #[arg(long, default_value_t = 1000, env = "AUTHKEEPER_LOW_WATER_MS")]
    pub low_water_ms: u64,

    /// Settle window for file-change bursts, in milliseconds.
    #[arg(long, default_value_t = 500, env = "AUTHKEEPER_DEBOUNCE_MS")]
    pub debounce_ms: u64,

    /// Interval between status reports, in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "AUTHKEEPER_STATUS_INTERVAL_MS")]
    pub status_interval_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "AUTHKEEPER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, env = "AUTHKEEPER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            settings: None,
            data_dir: None,
            min_delay_ms: 100,
            low_water_ms: 1000,
            debounce_ms: 500,
            status_interval_ms: 60_000,
            log_format: "text".into(),
            log_level: "info".into(),
        }
    }
}

impl KeeperConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms == 0 {
            anyhow::bail!("--min-delay-ms must be greater than zero");
        }
        if self.debounce_ms == 0 {
            anyhow::bail!("--debounce-ms must be greater than zero");
        }
        if self.status_interval_ms == 0 {
            anyhow::bail!("--status-interval-ms must be greater than zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid --log-format: {other} (expected json or text)"),
        }
        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn low_water_mark(&self) -> Duration {
        Duration::from_millis(self.low_water_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn policy(&self) -> RefreshPolicy {
        RefreshPolicy { min_delay: self.min_delay(), low_water_mark: self.low_water_mark() }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(|| state_dir().join("settings.json"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(state_dir)
    }
}

/// Resolve the state directory for persisted settings.
///
/// Checks `AUTHKEEPER_STATE_DIR`, then `$XDG_STATE_HOME/authkeeper`, then
/// `$HOME/.local/state/authkeeper`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AUTHKEEPER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("authkeeper");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/authkeeper");
    }
    PathBuf::from(".authkeeper")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
