//! Debounced watching of category files for external edits.
//!
//! Raw filesystem events are filtered for editor and temporary-file noise,
//! classified into categories by file name, and coalesced so a burst of
//! activity produces a single notification.

mod change_watcher;
mod classify;
mod error;
mod file_watcher;

#[cfg(test)]
mod tests;

pub use change_watcher::{ChangeCallback, ChangeWatcher, DEBOUNCE_WINDOW, SuppressPredicate};
pub use classify::{BACKUP_PREFIXES, FileClassifier, LOCK_SUFFIX, is_noise};
pub use error::WatchError;
pub use file_watcher::{FileEvent, FileEventKind};
