use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;

/// How long after the store's own write finishes events are still ignored.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(250);

/// Tracks the store's own writes so the watcher can ignore the events they cause.
#[derive(Debug, Default)]
pub(crate) struct SelfWrites {
    in_flight: AtomicUsize,
    last_finished: Mutex<Option<Instant>>,
}

impl SelfWrites {
    /// Marks a write as started. The write counts as finished when the guard drops.
    pub(crate) fn begin(self: &Arc<Self>) -> SelfWriteGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        SelfWriteGuard {
            tracker: Arc::clone(self),
        }
    }

    /// `true` while a write is in flight or within the settle window after one.
    pub(crate) fn is_active(&self) -> bool {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return true;
        }

        let last = match self.last_finished.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        last.is_some_and(|finished| finished.elapsed() < SETTLE_WINDOW)
    }
}

/// Ends a tracked write on drop.
pub(crate) struct SelfWriteGuard {
    tracker: Arc<SelfWrites>,
}

impl Drop for SelfWriteGuard {
    fn drop(&mut self) {
        // Record completion first so there is no gap where neither marker holds.
        match self.tracker.last_finished.lock() {
            Ok(mut guard) => *guard = Some(Instant::now()),
            Err(poisoned) => *poisoned.into_inner() = Some(Instant::now()),
        }
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
