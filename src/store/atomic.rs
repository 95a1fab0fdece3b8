use std::{
    fs,
    io::{self, ErrorKind, Write},
    path::Path,
    thread,
    time::Duration,
};

use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use super::StoreError;

/// Rename attempts made before a transient failure is reported.
pub const RENAME_ATTEMPTS: u32 = 3;

/// Pause between rename attempts.
pub const RENAME_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Marker ending every temporary file written next to a category file.
pub const TEMP_SUFFIX: &str = ".tmp";

/// The rename step of an atomic write.
///
/// Separated out so contention from scanners and backup agents can be
/// reproduced without a second process holding the file.
pub trait Rename: Send + Sync + 'static {
    /// Moves `from` over `to`, replacing it.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Renames with [`std::fs::rename`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRename;

impl Rename for FsRename {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Whether an I/O error is lock contention worth retrying.
///
/// Permission and capacity errors are not: another attempt fails the same way.
pub fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        ErrorKind::ResourceBusy | ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33))
}

/// Writes `content` to a sibling temporary file, then renames it over `path`.
///
/// Blocking; callers run it on the blocking pool. The temporary file never
/// outlives the call.
pub(crate) fn write_atomically(
    path: &Path,
    content: &[u8],
    renamer: &dyn Rename,
) -> Result<(), StoreError> {
    let write_failed = |source: io::Error| StoreError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_failed)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut temp = Builder::new()
        .prefix(&format!("{file_name}."))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(write_failed)?;
    temp.write_all(content).map_err(write_failed)?;
    temp.as_file().sync_all().map_err(write_failed)?;

    let temp_path = temp.into_temp_path();
    debug!(temp = %temp_path.display(), target = %path.display(), "Temporary file written");

    match rename_with_retry(&temp_path, path, renamer) {
        Ok(()) => {
            // Already moved into place; disarm the delete-on-drop.
            if let Err(e) = temp_path.keep() {
                debug!(error = %e, "Temporary path already gone after rename");
            }
            Ok(())
        }
        Err(err) => {
            discard(temp_path);
            Err(err)
        }
    }
}

fn rename_with_retry(
    temp_path: &TempPath,
    path: &Path,
    renamer: &dyn Rename,
) -> Result<(), StoreError> {
    let mut attempt = 1;

    loop {
        match renamer.rename(temp_path, path) {
            Ok(()) => {
                debug!(target = %path.display(), attempt, "Rename completed");
                return Ok(());
            }
            Err(source) if !is_transient(&source) => {
                return Err(StoreError::WriteFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(source) if attempt >= RENAME_ATTEMPTS => {
                return Err(StoreError::RetriesExhausted {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
            Err(source) => {
                warn!(
                    target = %path.display(),
                    attempt,
                    error = %source,
                    "Rename blocked, retrying"
                );
                thread::sleep(RENAME_RETRY_DELAY);
                attempt += 1;
            }
        }
    }
}

fn discard(temp_path: TempPath) {
    let shown = temp_path.display().to_string();
    if let Err(e) = temp_path.close() {
        warn!(temp = %shown, error = %e, "Failed to remove temporary file");
    }
}
