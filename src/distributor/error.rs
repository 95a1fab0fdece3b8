use std::path::PathBuf;

use crate::{store::StoreError, watcher::WatchError};

/// Errors returned by the data distributor.
#[derive(Debug, thiserror::Error)]
pub enum DistributorError {
    /// Reading or persisting a category failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// External-edit watching could not be started.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The data root could not be created or inspected.
    #[error("failed to prepare data root '{path}': {details}")]
    DataRoot {
        /// The data root directory
        path: PathBuf,
        /// I/O error details
        details: String,
    },
}
