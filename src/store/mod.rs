//! Locked, crash-safe persistence of category files.
//!
//! Writes go to a uniquely named sibling temporary file that is then renamed
//! over the target, so the canonical file only ever holds a complete document.
//! Read-modify-write cycles on one path are serialized within the process.

mod atomic;
mod error;
mod locked;

#[cfg(test)]
mod tests;

pub use atomic::{
    FsRename, RENAME_ATTEMPTS, RENAME_RETRY_DELAY, Rename, TEMP_SUFFIX, is_transient,
};
pub use error::StoreError;
pub use locked::LockedFileStore;
