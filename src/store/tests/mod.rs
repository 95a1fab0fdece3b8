//! Unit tests for the locked file store.
//! Each test works in its own temporary directory.

#![allow(clippy::unwrap_used)]

use std::{
    fs, io,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use tempfile::TempDir;

use crate::store::{FsRename, LockedFileStore, RENAME_ATTEMPTS, Rename, StoreError, is_transient};

/// Fails the first `failures` renames with `kind`, then renames for real.
struct FlakyRename {
    failures: u32,
    kind: io::ErrorKind,
    calls: Arc<AtomicU32>,
}

impl FlakyRename {
    fn new(failures: u32, kind: io::ErrorKind) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let renamer = Self {
            failures,
            kind,
            calls: Arc::clone(&calls),
        };
        (renamer, calls)
    }
}

impl Rename for FlakyRename {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(io::Error::new(self.kind, "held by another process"));
        }
        FsRename.rename(from, to)
    }
}

fn temp_artifacts(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.unwrap().file_name().into_string().ok())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[tokio::test]
async fn atomic_write_replaces_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.json");
    fs::write(&path, "old").unwrap();

    let store = LockedFileStore::new();
    store.atomic_write(&path, "[]").await.unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    assert!(temp_artifacts(dir.path()).is_empty());
}

#[tokio::test]
async fn atomic_write_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("servers.json");

    LockedFileStore::new()
        .atomic_write(&path, b"[]".to_vec())
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
}

#[tokio::test]
async fn rename_blocked_twice_then_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("groups.json");
    let (renamer, calls) = FlakyRename::new(2, io::ErrorKind::ResourceBusy);

    let store = LockedFileStore::with_renamer(renamer);
    store.atomic_write(&path, "{}").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    assert!(temp_artifacts(dir.path()).is_empty());
}

#[tokio::test]
async fn rename_blocked_forever_reports_exhaustion() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("groups.json");
    fs::write(&path, "{\"kept\":[]}").unwrap();
    let (renamer, calls) = FlakyRename::new(u32::MAX, io::ErrorKind::ResourceBusy);

    let store = LockedFileStore::with_renamer(renamer);
    let err = store.atomic_write(&path, "{}").await.unwrap_err();

    assert!(matches!(
        err,
        StoreError::RetriesExhausted { attempts, .. } if attempts == RENAME_ATTEMPTS
    ));
    assert!(err.is_transient());
    assert_eq!(calls.load(Ordering::SeqCst), RENAME_ATTEMPTS);
    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"kept\":[]}");
    assert!(temp_artifacts(dir.path()).is_empty());
}

#[tokio::test]
async fn permission_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("servers.json");
    let (renamer, calls) = FlakyRename::new(u32::MAX, io::ErrorKind::PermissionDenied);

    let store = LockedFileStore::with_renamer(renamer);
    let err = store.atomic_write(&path, "[]").await.unwrap_err();

    assert!(matches!(err, StoreError::WriteFailed { .. }));
    assert!(!err.is_transient());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!path.exists());
    assert!(temp_artifacts(dir.path()).is_empty());
}

/// Deletes the temporary file out from under the writer, then fails for good.
struct VanishingRename;

impl Rename for VanishingRename {
    fn rename(&self, from: &Path, _to: &Path) -> io::Result<()> {
        fs::remove_file(from)?;
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }
}

#[tokio::test]
async fn failed_write_tolerates_temp_file_already_removed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("servers.json");
    fs::write(&path, "[]").unwrap();
    let store = LockedFileStore::with_renamer(VanishingRename);

    let err = store.atomic_write(&path, "[{}]").await.unwrap_err();

    assert!(matches!(err, StoreError::WriteFailed { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    assert!(temp_artifacts(dir.path()).is_empty());
}

#[test]
fn transient_error_classification() {
    assert!(is_transient(&io::Error::from(io::ErrorKind::ResourceBusy)));
    assert!(is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
    assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    assert!(!is_transient(&io::Error::from(io::ErrorKind::StorageFull)));
    assert!(!is_transient(&io::Error::from(io::ErrorKind::NotFound)));
}

#[tokio::test]
async fn modify_missing_file_seeds_from_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("servers.json");

    let store = LockedFileStore::new();
    let written = store
        .modify(
            &path,
            |mut names: Vec<String>| {
                names.push("SRV-001".to_string());
                names
            },
            vec!["DB-02".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(written, ["DB-02", "SRV-001"]);
    let on_disk: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk, written);
}

#[tokio::test]
async fn modify_invalid_content_falls_back_to_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contacts.json");
    fs::write(&path, "{ not json").unwrap();

    let store = LockedFileStore::new();
    let written = store
        .modify(&path, |count: u32| count + 1, 41)
        .await
        .unwrap();

    assert_eq!(written, 42);
    assert_eq!(fs::read_to_string(&path).unwrap(), "42");
}

#[tokio::test]
async fn modify_reads_existing_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("oncall.json");
    fs::write(&path, "[1, 2]").unwrap();

    let store = LockedFileStore::new();
    let written = store
        .modify(
            &path,
            |mut values: Vec<u32>| {
                values.push(3);
                values
            },
            Vec::new(),
        )
        .await
        .unwrap();

    assert_eq!(written, [1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_modifies_are_serialized() {
    const WRITERS: u32 = 24;

    let dir = TempDir::new().unwrap();
    let path = Arc::new(dir.path().join("groups.json"));
    let store = LockedFileStore::new();

    let tasks: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = store.clone();
            let path = Arc::clone(&path);
            tokio::spawn(async move {
                store
                    .modify(
                        &path,
                        move |mut seen: Vec<u32>| {
                            seen.push(i);
                            seen
                        },
                        Vec::new(),
                    )
                    .await
                    .unwrap()
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let mut on_disk: Vec<u32> =
        serde_json::from_str(&fs::read_to_string(&*path).unwrap()).unwrap();
    on_disk.sort_unstable();
    assert_eq!(on_disk, (0..WRITERS).collect::<Vec<_>>());
    assert!(temp_artifacts(dir.path()).is_empty());
}

#[tokio::test]
async fn read_distinguishes_missing_and_corrupt() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("servers.json");
    let corrupt = dir.path().join("contacts.json");
    fs::write(&corrupt, "[{").unwrap();

    let store = LockedFileStore::new();

    assert!(store.read::<Vec<u32>>(&missing).await.unwrap().is_none());
    assert!(matches!(
        store.read::<Vec<u32>>(&corrupt).await,
        Err(StoreError::Parse { .. })
    ));
    assert_eq!(
        store.load_or_default(&corrupt, vec![7u32]).await.unwrap(),
        [7]
    );
}
