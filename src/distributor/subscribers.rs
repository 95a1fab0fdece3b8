use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use tracing::trace;

use super::Snapshot;

/// Callback invoked with every snapshot a subscriber should see.
pub type SnapshotCallback = Arc<dyn Fn(Arc<Snapshot>) + Send + Sync>;

/// A registered callback.
struct Subscriber {
    id: u64,
    callback: SnapshotCallback,
    /// One past the highest revision delivered; zero before the first delivery.
    ///
    /// Held while the callback runs, so deliveries to one subscriber never
    /// overlap and arrive in revision order.
    next_revision: Mutex<u64>,
}

impl Subscriber {
    /// Invokes the callback unless a newer snapshot was already delivered.
    ///
    /// Returns whether the callback ran.
    fn deliver(&self, snapshot: &Arc<Snapshot>) -> bool {
        let revision = snapshot.revision();
        let mut next_revision = match self.next_revision.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *next_revision > revision {
            trace!(id = self.id, revision, "Skipping superseded snapshot");
            return false;
        }

        *next_revision = revision + 1;
        (self.callback)(Arc::clone(snapshot));
        true
    }
}

/// Every live subscriber of a distributor.
///
/// Callbacks run synchronously on the publishing task, outside the registry
/// lock, so a callback may subscribe or unsubscribe without deadlocking.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl Subscribers {
    fn entries(&self) -> MutexGuard<'_, Vec<Arc<Subscriber>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers `callback` and hands it the snapshot returned by `current`.
    ///
    /// `current` is read after registration, so a publication racing with
    /// the subscription is never missed.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        callback: SnapshotCallback,
        current: impl FnOnce() -> Arc<Snapshot>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            callback,
            next_revision: Mutex::new(0),
        });

        self.entries().push(Arc::clone(&subscriber));
        subscriber.deliver(&current());

        Subscription {
            id,
            registry: Arc::downgrade(self),
            active: AtomicBool::new(true),
        }
    }

    /// Pushes `snapshot` to every subscriber. Returns how many callbacks ran.
    pub(crate) fn publish(&self, snapshot: &Arc<Snapshot>) -> usize {
        let subscribers = self.entries().clone();
        subscribers
            .iter()
            .filter(|subscriber| subscriber.deliver(snapshot))
            .count()
    }

    fn remove(&self, id: u64) {
        self.entries().retain(|subscriber| subscriber.id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }
}

/// A subscription handle that unsubscribes when dropped.
///
/// Hold on to it for as long as the callback should keep receiving snapshots.
pub struct Subscription {
    id: u64,
    registry: Weak<Subscribers>,
    active: AtomicBool,
}

impl Subscription {
    /// Stops deliveries to the callback. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.registry.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
