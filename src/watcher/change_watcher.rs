use std::{
    collections::BTreeSet,
    mem,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, info, trace};

use super::{
    FileClassifier, WatchError,
    file_watcher::{FileEvent, FileWatcher},
};
use crate::model::Category;

/// Quiet period after the last accepted event before a notification fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Receives the categories touched during one quiet window.
pub type ChangeCallback = Arc<dyn Fn(BTreeSet<Category>) + Send + Sync>;

/// Returns `true` while every event should be ignored.
pub type SuppressPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Categories accumulated since the last delivered notification.
#[derive(Default)]
struct PendingChangeSet {
    categories: Mutex<BTreeSet<Category>>,
}

impl PendingChangeSet {
    fn lock(&self) -> MutexGuard<'_, BTreeSet<Category>> {
        match self.categories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn insert(&self, category: Category) {
        self.lock().insert(category);
    }

    fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take(&self) -> BTreeSet<Category> {
        mem::take(&mut *self.lock())
    }

    fn snapshot(&self) -> BTreeSet<Category> {
        self.lock().clone()
    }
}

/// Observes category files for external edits and reports coalesced changes.
///
/// Raw events pass through the suppression predicate, the noise filter and
/// classification, in that order. Accepted categories accumulate until no
/// further event arrives for [`DEBOUNCE_WINDOW`]; the set is then delivered
/// as a single notification and cleared.
pub struct ChangeWatcher {
    pending: Arc<PendingChangeSet>,
    task: JoinHandle<()>,
    _fs: Option<FileWatcher>,
}

impl ChangeWatcher {
    /// Starts watching `root` for changes to the files `classifier` recognises.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// * `WatchError::Init` - If the platform watcher cannot be created
    /// * `WatchError::Watch` - If `root` cannot be watched
    pub fn watch(
        root: &Path,
        classifier: FileClassifier,
        suppress: SuppressPredicate,
        on_change: ChangeCallback,
    ) -> Result<Self, WatchError> {
        let (fs, events) = FileWatcher::watch_dir(root)?;
        info!(root = %root.display(), "Watching data root for external edits");

        let mut watcher = Self::spawn(events, classifier, suppress, on_change);
        watcher._fs = Some(fs);
        Ok(watcher)
    }

    /// Runs the debounce loop over an arbitrary event source.
    pub(crate) fn spawn(
        events: mpsc::UnboundedReceiver<FileEvent>,
        classifier: FileClassifier,
        suppress: SuppressPredicate,
        on_change: ChangeCallback,
    ) -> Self {
        let pending = Arc::new(PendingChangeSet::default());
        let task = tokio::spawn(debounce_loop(
            events,
            classifier,
            suppress,
            on_change,
            Arc::clone(&pending),
        ));

        Self {
            pending,
            task,
            _fs: None,
        }
    }

    /// Drops any accumulated changes without notifying.
    ///
    /// A notification whose window had not yet elapsed never fires. Safe to
    /// call with nothing pending.
    pub fn cleanup(&self) {
        let dropped = self.pending.take();
        if !dropped.is_empty() {
            debug!(?dropped, "Discarded pending changes");
        }
    }

    /// Categories waiting for the current quiet window to end.
    pub fn pending(&self) -> BTreeSet<Category> {
        self.pending.snapshot()
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.cleanup();
        self.task.abort();
    }
}

async fn debounce_loop(
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    classifier: FileClassifier,
    suppress: SuppressPredicate,
    on_change: ChangeCallback,
    pending: Arc<PendingChangeSet>,
) {
    let debounce_sleep = tokio::time::sleep(DEBOUNCE_WINDOW);
    tokio::pin!(debounce_sleep);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("File event source closed, stopping watcher");
                    return;
                };

                if suppress() {
                    trace!(path = %event.path.display(), "Event suppressed during own write");
                    continue;
                }

                let Some(category) = classifier.classify(&event.path) else {
                    trace!(path = %event.path.display(), "Ignoring unrecognised file");
                    continue;
                };

                debug!(%category, kind = ?event.kind, "Change accepted");
                pending.insert(category);
                debounce_sleep.as_mut().reset(Instant::now() + DEBOUNCE_WINDOW);
            }

            _ = &mut debounce_sleep, if !pending.is_empty() => {
                let changed = pending.take();
                if !changed.is_empty() {
                    info!(?changed, "External changes detected");
                    on_change(changed);
                }
            }
        }
    }
}
