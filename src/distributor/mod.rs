//! In-memory snapshot distribution.
//!
//! The [`DataDistributor`] loads every category at startup, applies typed
//! mutations through the locked file store, reloads categories edited on
//! disk by other programs, and pushes whole snapshots to subscribers.

#[allow(clippy::module_inception)]
mod distributor;
mod error;
mod events;
mod self_writes;
mod snapshot;
mod subscribers;


pub use distributor::DataDistributor;
pub use error::DistributorError;
pub use events::{ReloadEvent, ReloadReport};
pub use self_writes::SETTLE_WINDOW;
pub use snapshot::Snapshot;
pub use subscribers::{SnapshotCallback, Subscription};
