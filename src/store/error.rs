use std::{io, path::PathBuf};

/// Errors that can occur while reading or persisting a category file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The rename kept failing with a transient error until the retry budget ran out.
    #[error("gave up writing '{path}' after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Target of the write
        path: PathBuf,
        /// Number of rename attempts made
        attempts: u32,
        /// Error from the last attempt
        #[source]
        source: io::Error,
    },

    /// The write failed with an error that retrying cannot fix (permissions, disk full).
    #[error("failed to write '{path}': {source}")]
    WriteFailed {
        /// Target of the write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Reading a category file failed for a reason other than it being absent.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// On-disk content could not be parsed.
    #[error("failed to parse '{path}': {details}")]
    Parse {
        /// File holding the malformed content
        path: PathBuf,
        /// Parser error details
        details: String,
    },

    /// A value could not be serialized for writing.
    #[error("failed to serialize content for '{path}': {details}")]
    Serialize {
        /// Target of the write
        path: PathBuf,
        /// Serializer error details
        details: String,
    },

    /// A blocking filesystem task was cancelled or panicked.
    #[error("filesystem task for '{path}' did not complete: {details}")]
    TaskFailed {
        /// Path the task was working on
        path: PathBuf,
        /// Join error details
        details: String,
    },
}

impl StoreError {
    /// Whether the failure came from transient contention rather than a hard error.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::RetriesExhausted { .. })
    }
}
