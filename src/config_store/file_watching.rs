use std::{
    io,
    sync::{Arc, PoisonError, Weak, atomic::Ordering},
    time::{Duration, SystemTime},
};

use tokio::{runtime::Handle, sync::mpsc::UnboundedReceiver};
use tracing::{debug, warn};

use super::{
    ConfigError, ConfigStore,
    file_watcher::{FileEvent, FileEventKind, FileWatcher},
    store::Inner,
};

type Wake = (FileWatcher, UnboundedReceiver<FileEvent>);

/// Quiet period after a filesystem event before the file is checked.
const SETTLE: Duration = Duration::from_millis(100);

impl ConfigStore {
    /// True while the background watcher is running.
    pub fn watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the background watcher and clears `sync_up`.
    pub fn stop_watching(&self) {
        self.inner.sync_up.store(false, Ordering::SeqCst);

        let handle = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.abort();
            debug!(path = %self.inner.path.display(), "Stopped configuration watcher");
        }
    }

    /// Spawns the watcher loop unless one is already alive.
    ///
    /// # Errors
    /// * `ConfigError::LockError` - If the watcher slot is poisoned
    /// * `ConfigError::ServiceUnavailable` - If called outside a tokio runtime
    pub(crate) fn start_watching(&self) -> Result<(), ConfigError> {
        let mut slot = self.inner.watcher.lock().map_err(|e| ConfigError::LockError {
            lock_type: "watcher".to_string(),
            details: e.to_string(),
        })?;

        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| ConfigError::ServiceUnavailable {
            service: "tokio runtime".to_string(),
            details: format!("file watching needs a running runtime: {e}"),
        })?;

        let wake = if self.inner.fs_events {
            match FileWatcher::watch(&self.inner.path) {
                Ok(wake) => {
                    debug!(path = %wake.0.path().display(), "Listening for filesystem events");
                    Some(wake)
                }
                Err(e) => {
                    warn!(error = %e, "Filesystem events unavailable, polling only");
                    None
                }
            }
        } else {
            None
        };

        debug!(
            path = %self.inner.path.display(),
            interval_ms = self.inner.interval().as_millis(),
            fs_events = wake.is_some(),
            "Spinning up configuration watcher"
        );

        *slot = Some(runtime.spawn(watch_loop(Arc::downgrade(&self.inner), wake)));
        Ok(())
    }
}

async fn watch_loop(store: Weak<Inner>, mut wake: Option<Wake>) {
    loop {
        let Some(inner) = store.upgrade() else {
            debug!("Configuration store dropped, watcher exiting");
            break;
        };

        if !inner.sync_up.load(Ordering::SeqCst) {
            debug!(path = %inner.path.display(), "sync_up disabled, watcher exiting");
            break;
        }

        let interval = inner.interval();
        check_for_changes(&inner).await;
        drop(inner);

        let closed = match wake.as_mut() {
            Some((_, events)) => tokio::select! {
                _ = tokio::time::sleep(interval) => false,
                closed = next_change(events) => closed || settle(events).await,
            },
            None => {
                tokio::time::sleep(interval).await;
                false
            }
        };

        if closed {
            warn!("Filesystem event channel closed, falling back to polling");
            wake = None;
        }
    }
}

/// Waits for an event that may have left new contents behind. Removals are
/// skipped. Returns true if the channel closed.
async fn next_change(events: &mut UnboundedReceiver<FileEvent>) -> bool {
    while let Some(event) = events.recv().await {
        if event.kind != FileEventKind::Removed {
            debug!(path = %event.path.display(), kind = ?event.kind, "Config file event");
            return false;
        }
    }
    true
}

/// Drains events until none arrive for [`SETTLE`]. Returns true if the channel closed.
async fn settle(events: &mut UnboundedReceiver<FileEvent>) -> bool {
    loop {
        match tokio::time::timeout(SETTLE, events.recv()).await {
            Err(_) => return false,
            Ok(Some(_)) => continue,
            Ok(None) => return true,
        }
    }
}

async fn check_for_changes(inner: &Arc<Inner>) {
    let modified = match tokio::fs::metadata(&inner.path).await {
        Ok(metadata) => match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %inner.path.display(), error = %e, "Cannot read modification time");
                return;
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(path = %inner.path.display(), error = %e, "Failed to stat config file");
            return;
        }
    };

    if !is_stale(inner.last_refresh(), modified) {
        return;
    }

    let store = ConfigStore {
        inner: Arc::clone(inner),
    };

    match tokio::task::spawn_blocking(move || store.reload()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(path = %inner.path.display(), error = %e, "Reload failed"),
        Err(e) => warn!(path = %inner.path.display(), error = %e, "Reload task panicked"),
    }
}

fn is_stale(last_refresh: Option<SystemTime>, modified: SystemTime) -> bool {
    last_refresh.is_none_or(|seen| modified > seen)
}
