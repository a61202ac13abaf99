// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authkeeper: keeps stored credentials refreshed ahead of expiry and in step
//! with an out-of-band credential store.

pub mod account;
pub mod client_cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod mirror;
pub mod refresh;
pub mod request;
pub mod service;
pub mod settings;
pub mod status;
pub mod store;
pub mod test_support;
pub mod watch;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::KeeperConfig;
use crate::service::KeeperService;
use crate::store::FileStoreFactory;

/// Run the keeper until SIGTERM or SIGINT.
pub async fn run(config: KeeperConfig) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let factory = Arc::new(FileStoreFactory::new(Arc::clone(&clock)));
    let service = KeeperService::activate(&config, factory, clock).await?;

    let stop = CancellationToken::new();
    spawn_signal_handler(stop.clone());
    stop.cancelled().await;

    service.shutdown().await;
    Ok(())
}

fn spawn_signal_handler(stop: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        stop.cancel();
    });
}
