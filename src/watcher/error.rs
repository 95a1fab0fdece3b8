use std::path::PathBuf;

/// Errors raised while setting up filesystem watching.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform watcher could not be created.
    #[error("failed to initialize file watcher: {details}")]
    Init {
        /// Watcher initialization error details
        details: String,
    },

    /// A path could not be added to the watch list.
    #[error("file watcher error for '{path}': {details}")]
    Watch {
        /// Path that was being watched
        path: PathBuf,
        /// Watcher error details
        details: String,
    },
}
