use std::{
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use super::{
    StoreError,
    atomic::{self, FsRename, Rename},
};

type PathLock = Arc<AsyncMutex<()>>;

/// Crash-safe persistence of one JSON document per path.
///
/// Every operation on a path holds that path's lock, so writes and
/// read-modify-write cycles on the same path are strictly ordered. Locks are
/// keyed by the path exactly as given, created lazily and never removed.
/// Operations on different paths run independently.
#[derive(Clone)]
pub struct LockedFileStore {
    locks: Arc<Mutex<HashMap<PathBuf, PathLock>>>,
    renamer: Arc<dyn Rename>,
}

impl LockedFileStore {
    /// Creates a store that renames with the real filesystem.
    pub fn new() -> Self {
        Self::with_renamer(FsRename)
    }

    /// Creates a store that performs the rename step through `renamer`.
    pub fn with_renamer(renamer: impl Rename) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            renamer: Arc::new(renamer),
        }
    }

    fn lock_for(&self, path: &Path) -> PathLock {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Atomically replaces the content of `path`.
    ///
    /// Readers see either the previous content or `content`, never a mix.
    /// Transient rename failures are retried a bounded number of times.
    ///
    /// # Errors
    /// * `StoreError::RetriesExhausted` - If the rename stayed blocked on every attempt
    /// * `StoreError::WriteFailed` - If writing hit a non-retryable error
    #[instrument(skip(self, content), fields(path = %path.display()))]
    pub async fn atomic_write(
        &self,
        path: &Path,
        content: impl Into<Vec<u8>>,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        self.write_unlocked(path, content.into()).await
    }

    /// Reads and parses the document at `path`.
    ///
    /// Returns `None` if the file does not exist.
    ///
    /// # Errors
    /// * `StoreError::Io` - If the file exists but cannot be read
    /// * `StoreError::Parse` - If the content is not a valid document
    pub async fn read<T>(&self, path: &Path) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        read_unlocked(path).await
    }

    /// Reads the document at `path`, substituting `default` when the file is
    /// missing or malformed.
    ///
    /// # Errors
    /// * `StoreError::Io` - If the file exists but cannot be read
    pub async fn load_or_default<T>(&self, path: &Path, default: T) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        recover_parse(path, read_unlocked(path).await, default)
    }

    /// Applies `mutator` to the current document and persists the result.
    ///
    /// The whole read-mutate-write cycle holds the path's lock, so a second
    /// call always observes the first call's completed write. A missing or
    /// malformed file is replaced by `default` before mutating.
    ///
    /// Returns the value that was written.
    ///
    /// # Errors
    /// * `StoreError::Io` - If the existing file cannot be read
    /// * `StoreError::Serialize` - If the new value cannot be serialized
    /// * `StoreError::RetriesExhausted` / `StoreError::WriteFailed` - If persisting failed
    #[instrument(skip(self, mutator, default), fields(path = %path.display()))]
    pub async fn modify<T, F>(&self, path: &Path, mutator: F, default: T) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce(T) -> T + Send,
    {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;

        let current = recover_parse(path, read_unlocked(path).await, default)?;
        let next = mutator(current);

        let content = serde_json::to_vec_pretty(&next).map_err(|e| StoreError::Serialize {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        self.write_unlocked(path, content).await?;

        debug!("Document modified");
        Ok(next)
    }

    async fn write_unlocked(&self, path: &Path, content: Vec<u8>) -> Result<(), StoreError> {
        let target = path.to_path_buf();
        let renamer = Arc::clone(&self.renamer);

        // Runs to completion even if the caller stops waiting.
        tokio::task::spawn_blocking(move || {
            atomic::write_atomically(&target, &content, renamer.as_ref())
        })
        .await
        .map_err(|e| StoreError::TaskFailed {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?
    }
}

impl Default for LockedFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockedFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracked = self.locks.lock().map(|locks| locks.len()).unwrap_or(0);
        f.debug_struct("LockedFileStore")
            .field("tracked_paths", &tracked)
            .finish()
    }
}

async fn read_unlocked<T>(path: &Path) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
{
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
}

fn recover_parse<T>(
    path: &Path,
    read: Result<Option<T>, StoreError>,
    default: T,
) -> Result<T, StoreError> {
    match read {
        Ok(Some(value)) => Ok(value),
        Ok(None) => {
            debug!(path = %path.display(), "No file yet, using default");
            Ok(default)
        }
        Err(StoreError::Parse { details, .. }) => {
            warn!(path = %path.display(), error = %details, "Malformed content, using default");
            Ok(default)
        }
        Err(e) => Err(e),
    }
}
