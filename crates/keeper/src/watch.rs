// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debounced file-change notification.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Coalesces bursts of wake-ups into one notification.
pub struct Debouncer {
    rx: mpsc::Receiver<()>,
    window: Duration,
}

impl Debouncer {
    pub fn new(rx: mpsc::Receiver<()>, window: Duration) -> Self {
        Self { rx, window }
    }

    /// Wait for a burst to start, then for `window` to pass with no further
    /// wake-ups. Returns false once every sender is gone.
    pub async fn next_burst(&mut self) -> bool {
        if self.rx.recv().await.is_none() {
            return false;
        }
        loop {
            match tokio::time::timeout(self.window, self.rx.recv()).await {
                Ok(Some(())) => continue,
                // Settled, or closed mid-burst: deliver what we have.
                Ok(None) | Err(_) => return true,
            }
        }
    }
}

/// Watches a set of files and runs a handler at most once per settled burst
/// of changes to any of them.
///
/// A file's directory does not need to exist yet: until it appears, its
/// nearest existing ancestor is watched instead, and the watch moves down
/// once the directory is created.
pub struct FileWatcher {
    paths: Vec<PathBuf>,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new(paths: Vec<PathBuf>, debounce: Duration) -> Self {
        Self { paths, debounce }
    }

    /// Start watching. The handler runs to completion before the next burst
    /// is considered; runs until `shutdown` is cancelled.
    pub fn spawn<F, Fut>(self, shutdown: CancellationToken, mut on_change: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (wake_tx, wake_rx) = mpsc::channel::<()>(1);
        let mut watches = match WatchSet::new(&self.paths, wake_tx.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!(err = %e, paths = ?self.paths, "file watch unavailable");
                None
            }
        };
        let debounce = self.debounce;

        tokio::spawn(async move {
            // Keep one sender alive for the task's lifetime.
            let _wake_tx = wake_tx;
            let mut debouncer = Debouncer::new(wake_rx, debounce);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    more = debouncer.next_burst() => {
                        if !more {
                            break;
                        }
                    }
                }
                if let Some(ref mut watches) = watches {
                    watches.rearm();
                }
                on_change().await;
            }
        })
    }
}

/// The OS watcher plus, for each target directory, the directory actually
/// watched on its behalf.
struct WatchSet {
    watcher: notify::RecommendedWatcher,
    targets: Vec<PathBuf>,
    armed: HashMap<PathBuf, PathBuf>,
}

impl WatchSet {
    /// Watch the parent directory of each path (so creation and atomic
    /// rename-over are seen) and wake for events touching a watched file name
    /// or a directory on the way to a target.
    fn new(paths: &[PathBuf], wake_tx: mpsc::Sender<()>) -> anyhow::Result<Self> {
        let names: HashSet<OsString> =
            paths.iter().filter_map(|p| p.file_name().map(OsString::from)).collect();
        let mut targets: Vec<PathBuf> = paths.iter().map(|p| watch_dir(p).to_path_buf()).collect();
        targets.sort();
        targets.dedup();

        let on_path = targets.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let relevant = match res {
                Ok(event) => event.paths.iter().any(|p| {
                    p.file_name().is_some_and(|n| names.contains(n))
                        || on_path.iter().any(|t| t.starts_with(p))
                }),
                Err(_) => true,
            };
            if relevant {
                let _ = wake_tx.try_send(());
            }
        })?;

        let mut set = Self { watcher, targets, armed: HashMap::new() };
        set.rearm();
        if set.armed.is_empty() && !set.targets.is_empty() {
            anyhow::bail!("no directory could be watched");
        }
        Ok(set)
    }

    /// Point each target's watch at the target itself when it exists, or at
    /// its nearest existing ancestor otherwise. Returns the targets that just
    /// became directly watched.
    fn rearm(&mut self) -> Vec<PathBuf> {
        use notify::{RecursiveMode, Watcher};

        let mut appeared = Vec::new();
        for target in &self.targets {
            let want = nearest_existing(target);
            let current = self.armed.get(target);
            if current == Some(&want) {
                continue;
            }
            let was_pending = current.is_some();
            if let Some(old) = self.armed.remove(target) {
                if !self.armed.values().any(|w| *w == old) {
                    let _ = self.watcher.unwatch(&old);
                }
            }
            match self.watcher.watch(&want, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    if want == *target {
                        if was_pending {
                            tracing::debug!(dir = %target.display(), "watched directory appeared");
                        }
                        appeared.push(target.clone());
                    } else {
                        tracing::debug!(
                            dir = %target.display(),
                            via = %want.display(),
                            "directory missing, watching ancestor"
                        );
                    }
                    self.armed.insert(target.clone(), want);
                }
                Err(e) => {
                    tracing::warn!(err = %e, dir = %want.display(), "failed to watch directory");
                }
            }
        }
        appeared
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `dir` itself if it is a directory, else the closest ancestor that is.
fn nearest_existing(dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|a| !a.as_os_str().is_empty() && a.is_dir())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
