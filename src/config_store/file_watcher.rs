use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

use super::ConfigError;

/// A file system event for the watched file.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The path reported by the platform watcher
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was modified
    Modified,
    /// File was created
    Created,
    /// File was removed
    Removed,
}

/// Filesystem notifications for a single backing file.
///
/// Watches the file's parent directory so that the file may be created,
/// replaced by an atomic rename, or removed without losing the watch. Events
/// for other files in the directory are dropped. The watch stops when this
/// value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl FileWatcher {
    /// Starts watching `path` and returns the watcher and its event receiver.
    ///
    /// Uses an unbounded channel since file events are infrequent but bursty.
    ///
    /// # Errors
    /// Returns `ConfigError::FileWatchError` if the parent directory does not
    /// exist or the platform watcher cannot be initialized.
    pub fn watch(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), ConfigError> {
        let watch_error = |details: String| ConfigError::FileWatchError {
            path: path.to_path_buf(),
            details,
        };

        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| watch_error("path has no file name".to_string()))?;

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            let kind = match event.kind {
                EventKind::Create(_) => FileEventKind::Created,
                EventKind::Modify(_) => FileEventKind::Modified,
                EventKind::Remove(_) => FileEventKind::Removed,
                _ => return,
            };

            for path in event.paths {
                if path.file_name() != Some(file_name.as_os_str()) {
                    continue;
                }
                let _ = event_tx.send(FileEvent { path, kind });
            }
        })
        .map_err(|e| watch_error(format!("Failed to create file watcher: {e}")))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(format!("Failed to watch {}: {e}", directory.display())))?;

        Ok((
            Self {
                _watcher: watcher,
                path: path.to_path_buf(),
            },
            event_rx,
        ))
    }

    /// The file being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
