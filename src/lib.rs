//! Relay - local storage for groups, contacts, servers and on-call rosters.
//!
//! Each category lives in its own JSON file under a data root. The crate
//! keeps an in-memory snapshot of all of them that is:
//!
//! - Written safely: every write goes through a temp file and an atomic rename,
//!   and read-modify-write cycles on one file never interleave
//! - Kept fresh: edits made by other programs are detected, debounced and
//!   reloaded, while the store's own writes are ignored
//! - Shared: subscribers receive every published snapshot
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use relay_store::{DataDistributor, model::Groups};
//!
//! # async fn run() -> Result<(), relay_store::distributor::DistributorError> {
//! let distributor = DataDistributor::open("/var/lib/relay").await?;
//! distributor.start_watching()?;
//!
//! let _subscription = distributor.subscribe(|snapshot| {
//!     println!("revision {}", snapshot.revision());
//! });
//!
//! distributor
//!     .mutate(|mut groups: Groups| {
//!         groups.add_member("Engineering", "alice@example.com");
//!         groups
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Settings file and directory layout.
pub mod config;

/// In-memory snapshot, mutation and reload.
pub mod distributor;

/// Categories and their typed documents.
pub mod model;

/// Atomic, locked persistence of JSON documents.
pub mod store;

/// Logging initialisation.
pub mod tracing_config;

/// Debounced observation of external edits.
pub mod watcher;

pub use distributor::{DataDistributor, Snapshot, Subscription};
pub use model::Category;
pub use store::{LockedFileStore, StoreError};
pub use watcher::ChangeWatcher;
