//! Unit tests for the change watcher.
//! Events are injected through a channel and time is paused, so no real
//! filesystem watching or wall-clock waiting is involved.

#![allow(clippy::unwrap_used)]

use std::{
    collections::BTreeSet,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc;

use crate::{
    model::Category,
    watcher::{ChangeWatcher, DEBOUNCE_WINDOW, FileClassifier, FileEvent, FileEventKind, is_noise},
};

struct Harness {
    events: mpsc::UnboundedSender<FileEvent>,
    notifications: Arc<Mutex<Vec<BTreeSet<Category>>>>,
    suppressed: Arc<AtomicBool>,
    watcher: ChangeWatcher,
}

impl Harness {
    fn new() -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let notifications = Arc::new(Mutex::new(Vec::new()));
        let suppressed = Arc::new(AtomicBool::new(false));

        let sink = Arc::clone(&notifications);
        let flag = Arc::clone(&suppressed);
        let watcher = ChangeWatcher::spawn(
            rx,
            FileClassifier::default(),
            Arc::new(move || flag.load(Ordering::SeqCst)),
            Arc::new(move |changed| sink.lock().unwrap().push(changed)),
        );

        Self {
            events,
            notifications,
            suppressed,
            watcher,
        }
    }

    fn touch(&self, name: &str) {
        let path = Path::new("/data/relay").join(name);
        self.events
            .send(FileEvent::new(path, FileEventKind::Modified))
            .unwrap();
    }

    fn notifications(&self) -> Vec<BTreeSet<Category>> {
        self.notifications.lock().unwrap().clone()
    }
}

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn set(categories: &[Category]) -> BTreeSet<Category> {
    categories.iter().copied().collect()
}

#[test]
fn noise_markers_are_recognised() {
    assert!(is_noise("contacts.json.lock"));
    assert!(is_noise("contacts.json.tmp"));
    assert!(is_noise("contacts.json.x7Yq2.tmp"));
    assert!(is_noise("~contacts.json"));
    assert!(is_noise(".~contacts.json"));
    assert!(is_noise("CONTACTS.JSON.TMP"));
    assert!(!is_noise("contacts.json"));
}

#[test]
fn classifier_uses_supplied_mapping() {
    let classifier = FileClassifier::new([(Category::Servers, ["inventory.json"])]);

    assert_eq!(
        classifier.classify(Path::new("/x/INVENTORY.json")),
        Some(Category::Servers)
    );
    assert_eq!(classifier.classify(Path::new("/x/servers.json")), None);
}

#[test]
fn default_classifier_knows_every_recognised_name() {
    let classifier = FileClassifier::default();

    for category in Category::ALL {
        for name in category.file_names() {
            assert_eq!(classifier.classify_name(name), Some(category));
        }
    }
}

#[test]
fn default_classifier_ignores_case() {
    let classifier = FileClassifier::default();

    assert_eq!(
        classifier.classify_name("CONTACTS.JSON"),
        Some(Category::Contacts)
    );
    assert_eq!(classifier.classify_name("Servers.Json"), Some(Category::Servers));
    assert_eq!(classifier.classify_name("On_Call.json"), Some(Category::OnCall));
}

#[test]
fn default_classifier_drops_unknown_and_noise() {
    let classifier = FileClassifier::default();

    assert_eq!(classifier.classify_name("notes.txt"), None);
    assert_eq!(classifier.classify_name("contacts.json.bak"), None);
    assert_eq!(classifier.classify_name("~contacts.json"), None);
    assert_eq!(classifier.classify_name(""), None);
}

#[tokio::test(start_paused = true)]
async fn burst_across_categories_yields_one_notification() {
    let harness = Harness::new();

    harness.touch("contacts.json");
    harness.touch("servers.json");
    harness.touch("contacts.json");
    wait(DEBOUNCE_WINDOW.as_millis() as u64 * 3).await;

    assert_eq!(
        harness.notifications(),
        [set(&[Category::Contacts, Category::Servers])]
    );
    assert!(harness.watcher.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn each_event_restarts_the_quiet_window() {
    let harness = Harness::new();

    harness.touch("groups.json");
    wait(60).await;
    harness.touch("groups.json");
    wait(60).await;
    harness.touch("oncall.json");
    wait(60).await;

    assert!(harness.notifications().is_empty());
    assert_eq!(
        harness.watcher.pending(),
        set(&[Category::Groups, Category::OnCall])
    );

    wait(60).await;
    assert_eq!(
        harness.notifications(),
        [set(&[Category::Groups, Category::OnCall])]
    );
}

#[tokio::test(start_paused = true)]
async fn separate_windows_notify_separately() {
    let harness = Harness::new();

    harness.touch("contacts.json");
    wait(200).await;
    harness.touch("servers.json");
    wait(200).await;

    assert_eq!(
        harness.notifications(),
        [set(&[Category::Contacts]), set(&[Category::Servers])]
    );
}

#[tokio::test(start_paused = true)]
async fn noise_never_notifies() {
    let harness = Harness::new();

    for name in [
        "contacts.json.lock",
        "contacts.json.tmp",
        "~contacts.json",
        ".~contacts.json",
        "notes.txt",
    ] {
        harness.touch(name);
    }
    wait(500).await;

    assert!(harness.notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn upper_case_name_classifies_like_lower_case() {
    let harness = Harness::new();

    harness.touch("CONTACTS.JSON");
    wait(200).await;

    assert_eq!(harness.notifications(), [set(&[Category::Contacts])]);
}

#[tokio::test(start_paused = true)]
async fn suppressed_events_are_dropped_until_released() {
    let harness = Harness::new();

    harness.suppressed.store(true, Ordering::SeqCst);
    for _ in 0..10 {
        harness.touch("contacts.json");
    }
    wait(500).await;
    assert!(harness.notifications().is_empty());

    harness.suppressed.store(false, Ordering::SeqCst);
    harness.touch("contacts.json");
    wait(200).await;

    assert_eq!(harness.notifications(), [set(&[Category::Contacts])]);
}

#[tokio::test(start_paused = true)]
async fn cleanup_cancels_pending_notification() {
    let harness = Harness::new();

    harness.touch("servers.json");
    wait(50).await;
    harness.watcher.cleanup();
    wait(500).await;

    assert!(harness.notifications().is_empty());
    assert!(harness.watcher.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cleanup_with_nothing_pending_is_harmless() {
    let harness = Harness::new();

    harness.watcher.cleanup();
    harness.watcher.cleanup();

    harness.touch("groups.json");
    wait(200).await;
    assert_eq!(harness.notifications(), [set(&[Category::Groups])]);
}
