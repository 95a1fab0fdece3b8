use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tracing::warn;

use super::WatchError;

/// Represents a file system event for a path inside the data root.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The path of the file that changed
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was modified or renamed into place
    Modified,
    /// File was created
    Created,
    /// File was removed
    Removed,
}

impl FileEvent {
    /// Creates an event for `path`.
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Watches the data root directory and forwards raw events into tokio.
///
/// The directory is watched rather than each file so the watch survives a
/// file being atomically replaced by rename. Uses an unbounded channel since
/// file events are typically infrequent but bursty.
pub(crate) struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Starts watching `root` non-recursively.
    ///
    /// # Errors
    /// * `WatchError::Init` - If the platform watcher cannot be created
    /// * `WatchError::Watch` - If `root` cannot be watched
    pub(crate) fn watch_dir(
        root: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), WatchError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "File watcher reported an error");
                    return;
                }
            };

            let kind = match event.kind {
                EventKind::Create(_) => FileEventKind::Created,
                EventKind::Modify(_) => FileEventKind::Modified,
                EventKind::Remove(_) => FileEventKind::Removed,
                _ => return,
            };

            for path in event.paths {
                let _ = event_tx.send(FileEvent { path, kind });
            }
        })
        .map_err(|e| WatchError::Init {
            details: e.to_string(),
        })?;

        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Watch {
                path: root.to_path_buf(),
                details: e.to_string(),
            })?;

        Ok((Self { _watcher: watcher }, event_rx))
    }
}
