use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use futures::Stream;
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, instrument, warn};

use super::{
    DistributorError, ReloadEvent, ReloadReport, Snapshot, Subscription,
    self_writes::SelfWrites,
    subscribers::{SnapshotCallback, Subscribers},
};
use crate::{
    model::{Category, Contacts, Document, Groups, OnCall, Servers},
    store::{LockedFileStore, StoreError},
    watcher::{ChangeCallback, ChangeWatcher, FileClassifier, SuppressPredicate},
};

type Apply = Box<dyn FnOnce(&mut Snapshot) + Send>;

struct Inner {
    root: PathBuf,
    /// Resolved file per category; re-resolved when the file goes missing.
    paths: Mutex<[PathBuf; 4]>,
    store: LockedFileStore,
    current: watch::Sender<Arc<Snapshot>>,
    subscribers: Arc<Subscribers>,
    /// Held while a category is read or written and its result published.
    gates: [AsyncMutex<()>; 4],
    self_writes: Arc<SelfWrites>,
    reload_events: broadcast::Sender<ReloadEvent>,
    watcher: Mutex<Option<ChangeWatcher>>,
}

/// Single source of truth for the in-memory snapshot.
///
/// Owns the published [`Snapshot`], persists mutations through a
/// [`LockedFileStore`], and reloads categories changed on disk by someone
/// else. Cloning is cheap and every clone refers to the same store.
#[derive(Clone)]
pub struct DataDistributor {
    inner: Arc<Inner>,
}

impl DataDistributor {
    /// Opens the data root and loads every category.
    ///
    /// A missing or corrupt category starts out empty instead of failing the
    /// whole open.
    ///
    /// # Errors
    /// * `DistributorError::DataRoot` - If the data root cannot be created
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DistributorError> {
        Self::open_with_store(root, LockedFileStore::new()).await
    }

    /// Like [`open`](Self::open), persisting through `store`.
    ///
    /// # Errors
    /// * `DistributorError::DataRoot` - If the data root cannot be created
    #[instrument(skip(root, store))]
    pub async fn open_with_store(
        root: impl Into<PathBuf>,
        store: LockedFileStore,
    ) -> Result<Self, DistributorError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| DistributorError::DataRoot {
                path: root.clone(),
                details: e.to_string(),
            })?;

        let mut paths: [PathBuf; 4] = Default::default();
        for category in Category::ALL {
            paths[category.index()] = category.resolve_path(&root).await;
        }
        info!(root = %root.display(), "Loading data root");

        let mut initial = Snapshot::empty();
        load_initial::<Groups>(&store, &paths, &mut initial).await;
        load_initial::<Contacts>(&store, &paths, &mut initial).await;
        load_initial::<Servers>(&store, &paths, &mut initial).await;
        load_initial::<OnCall>(&store, &paths, &mut initial).await;

        let (current, _) = watch::channel(Arc::new(initial));
        let (reload_events, _) = broadcast::channel(64);

        Ok(Self {
            inner: Arc::new(Inner {
                root,
                paths: Mutex::new(paths),
                store,
                current,
                subscribers: Arc::new(Subscribers::default()),
                gates: Default::default(),
                self_writes: Arc::new(SelfWrites::default()),
                reload_events,
                watcher: Mutex::new(None),
            }),
        })
    }

    /// The directory holding the category files.
    pub fn data_root(&self) -> &Path {
        &self.inner.root
    }

    /// The file currently backing `category`.
    ///
    /// Starts as the name resolved at open. If that file disappears and the
    /// category shows up under another recognised name, the next read or
    /// write of the category switches to it.
    pub fn path_for(&self, category: Category) -> PathBuf {
        self.paths()[category.index()].clone()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.current.borrow())
    }

    /// Registers `callback` for every published snapshot.
    ///
    /// The callback is invoked right away with the current snapshot, then
    /// synchronously on each publication. Deliveries stop when the returned
    /// handle is unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Arc<Snapshot>) + Send + Sync + 'static,
    {
        let callback: SnapshotCallback = Arc::new(callback);
        self.inner
            .subscribers
            .subscribe(callback, || self.snapshot())
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Stream of snapshots, starting with the current one.
    ///
    /// Slow consumers skip intermediate snapshots and always see the latest.
    pub fn snapshots(&self) -> impl Stream<Item = Arc<Snapshot>> + use<> {
        WatchStream::new(self.inner.current.subscribe())
    }

    /// Side channel reporting reload progress and per-category failures.
    pub fn reload_events(&self) -> broadcast::Receiver<ReloadEvent> {
        self.inner.reload_events.subscribe()
    }

    /// Applies `mutator` to the document of type `D` and persists the result.
    ///
    /// On success the written value is published in a new snapshot before
    /// this returns. On failure the snapshot is left untouched.
    ///
    /// # Errors
    /// * `DistributorError::Store` - If the document could not be read or persisted
    #[instrument(skip(self, mutator), fields(category = %D::CATEGORY))]
    pub async fn mutate<D, F>(&self, mutator: F) -> Result<Arc<Snapshot>, DistributorError>
    where
        D: Document,
        F: FnOnce(D) -> D + Send,
    {
        let category = D::CATEGORY;
        let _gate = self.inner.gates[category.index()].lock().await;

        let path = self.current_path(category).await;
        let written = {
            let _own_write = self.inner.self_writes.begin();
            self.inner
                .store
                .modify(&path, mutator, D::default())
                .await?
        };

        let snapshot = self.publish(move |next| *D::slot_mut(next) = Arc::new(written));
        debug!(revision = snapshot.revision(), "Mutation published");
        Ok(snapshot)
    }

    /// Re-reads `categories` from disk and publishes them in one snapshot.
    ///
    /// A category that fails to read keeps its previous value; the failure is
    /// reported on [`reload_events`](Self::reload_events) and in the returned
    /// report rather than aborting the others.
    #[instrument(skip(self, categories))]
    pub async fn reload(&self, categories: impl IntoIterator<Item = Category>) -> ReloadReport {
        let categories: BTreeSet<Category> = categories.into_iter().collect();
        let mut report = ReloadReport::default();
        if categories.is_empty() {
            return report;
        }

        info!(?categories, "Reloading categories");
        self.emit(ReloadEvent::Started {
            categories: categories.clone(),
        });

        // Ascending order, so concurrent reloads cannot deadlock.
        let mut gates = Vec::with_capacity(categories.len());
        for category in &categories {
            gates.push(self.inner.gates[category.index()].lock().await);
        }

        let mut staged: Vec<Apply> = Vec::with_capacity(categories.len());
        for &category in &categories {
            match self.read_category(category).await {
                Ok(apply) => {
                    staged.push(apply);
                    report.reloaded.insert(category);
                }
                Err(e) => {
                    error!(%category, error = %e, "Reload failed, keeping previous value");
                    self.emit(ReloadEvent::Failed {
                        category,
                        error: e.to_string(),
                    });
                    report.failed.push((category, e));
                }
            }
        }

        if !staged.is_empty() {
            let snapshot = self.publish(move |next| {
                for apply in staged {
                    apply(&mut *next);
                }
            });
            report.revision = Some(snapshot.revision());
        }
        drop(gates);

        self.emit(ReloadEvent::Completed {
            reloaded: report.reloaded.clone(),
            failed: report.failed.iter().map(|(category, _)| *category).collect(),
            revision: report.revision,
        });

        report
    }

    /// Starts reloading categories when their files are edited externally.
    ///
    /// Events caused by this distributor's own writes are ignored. Calling it
    /// again while already watching does nothing.
    ///
    /// # Errors
    /// * `DistributorError::Watch` - If the data root cannot be watched
    pub fn start_watching(&self) -> Result<(), DistributorError> {
        let mut slot = self.watcher_slot();
        if slot.is_some() {
            return Ok(());
        }

        // Every recognised name, so a category file appearing under another
        // name after open is still noticed.
        let classifier = FileClassifier::default();

        let self_writes = Arc::clone(&self.inner.self_writes);
        let suppress: SuppressPredicate = Arc::new(move || self_writes.is_active());

        let weak = Arc::downgrade(&self.inner);
        let on_change: ChangeCallback = Arc::new(move |categories| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let distributor = DataDistributor { inner };
            tokio::spawn(async move {
                distributor.reload(categories).await;
            });
        });

        *slot = Some(ChangeWatcher::watch(
            &self.inner.root,
            classifier,
            suppress,
            on_change,
        )?);

        Ok(())
    }

    /// Whether external edits are being watched.
    pub fn is_watching(&self) -> bool {
        self.watcher_slot().is_some()
    }

    /// Stops watching. Pending change notifications are discarded, not delivered.
    pub fn shutdown(&self) {
        if let Some(watcher) = self.watcher_slot().take() {
            watcher.cleanup();
            info!("Stopped watching data root");
        }
    }

    /// Opens the data root at `root` in place of this one.
    ///
    /// The new distributor shares this one's store. If this one was watching,
    /// it stops and the new one starts. Subscriptions stay with this
    /// distributor. On failure this distributor keeps running unchanged.
    ///
    /// # Errors
    /// * `DistributorError::DataRoot` - If the new data root cannot be created
    /// * `DistributorError::Watch` - If the new data root cannot be watched
    #[instrument(skip(self, root))]
    pub async fn relocate(&self, root: impl Into<PathBuf>) -> Result<Self, DistributorError> {
        let next = Self::open_with_store(root, self.inner.store.clone()).await?;

        if self.is_watching() {
            next.start_watching()?;
            self.shutdown();
        }

        info!(
            from = %self.inner.root.display(),
            to = %next.inner.root.display(),
            "Data root relocated"
        );
        Ok(next)
    }

    fn paths(&self) -> MutexGuard<'_, [PathBuf; 4]> {
        match self.inner.paths.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The file to read or write for `category`, re-resolved if it went missing.
    ///
    /// Callers hold the category's gate.
    async fn current_path(&self, category: Category) -> PathBuf {
        let known = self.path_for(category);
        if tokio::fs::try_exists(&known).await.unwrap_or(false) {
            return known;
        }

        let resolved = category.resolve_path(&self.inner.root).await;
        if resolved != known {
            info!(
                %category,
                from = %known.display(),
                to = %resolved.display(),
                "Category file moved to another recognised name"
            );
            self.paths()[category.index()] = resolved.clone();
        }
        resolved
    }

    fn watcher_slot(&self) -> MutexGuard<'_, Option<ChangeWatcher>> {
        match self.inner.watcher.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Builds the successor of the current snapshot, swaps it in and pushes it.
    fn publish(&self, apply: impl FnOnce(&mut Snapshot)) -> Arc<Snapshot> {
        let mut published = None;
        self.inner.current.send_modify(|current| {
            let mut next = current.successor();
            apply(&mut next);
            *current = Arc::new(next);
            published = Some(Arc::clone(current));
        });

        let Some(snapshot) = published else {
            return self.snapshot();
        };

        self.inner.subscribers.publish(&snapshot);
        snapshot
    }

    async fn read_category(&self, category: Category) -> Result<Apply, StoreError> {
        match category {
            Category::Groups => self.read_document::<Groups>().await,
            Category::Contacts => self.read_document::<Contacts>().await,
            Category::Servers => self.read_document::<Servers>().await,
            Category::OnCall => self.read_document::<OnCall>().await,
        }
    }

    async fn read_document<D: Document>(&self) -> Result<Apply, StoreError> {
        let path = self.current_path(D::CATEGORY).await;
        let document = self
            .inner
            .store
            .read::<D>(&path)
            .await?
            .unwrap_or_default();

        Ok(Box::new(move |next: &mut Snapshot| {
            *D::slot_mut(next) = Arc::new(document)
        }))
    }

    fn emit(&self, event: ReloadEvent) {
        // No receivers is fine; the channel is observability only.
        let _ = self.inner.reload_events.send(event);
    }
}

impl fmt::Debug for DataDistributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataDistributor")
            .field("root", &self.inner.root)
            .field("revision", &self.inner.current.borrow().revision())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

async fn load_initial<D: Document>(
    store: &LockedFileStore,
    paths: &[PathBuf; 4],
    snapshot: &mut Snapshot,
) {
    let path = &paths[D::CATEGORY.index()];
    match store.load_or_default(path, D::default()).await {
        Ok(document) => *D::slot_mut(snapshot) = Arc::new(document),
        Err(e) => {
            warn!(category = %D::CATEGORY, error = %e, "Could not load category, starting empty");
        }
    }
}
