//! Engine against a real inotify instance and a temporary directory

#![cfg(target_os = "linux")]

use dirwatch_core::LocalFileSystem;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use watcher::testing::{RecordedEvent, RecordingListener};
use watcher::{DirectoryEvent, WatchEngine, WatchError};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn setup() -> (TempDir, WatchEngine) {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("dir")).unwrap();
    let local = LocalFileSystem::new(tmp.path()).unwrap();
    let engine = WatchEngine::new(Arc::new(local)).unwrap();
    (tmp, engine)
}

fn next(listener: &RecordingListener) -> RecordedEvent {
    listener
        .recv_timeout(EVENT_TIMEOUT)
        .expect("timed out waiting for an event")
}

#[test]
fn test_file_lifecycle() {
    let (tmp, engine) = setup();
    let listener = RecordingListener::new();
    engine.watch("/dir", &listener.as_listener()).unwrap();
    assert_eq!(next(&listener).event, DirectoryEvent::WatchingDirectory);

    let file = tmp.path().join("dir").join("f");
    fs::write(&file, b"hello").unwrap();
    let added = next(&listener);
    assert_eq!(added.event, DirectoryEvent::FileAdded);
    assert_eq!(added.dir, "/dir");
    assert_eq!(added.name, "f");
    assert!(added.modified_at > 0);

    fs::remove_file(&file).unwrap();
    assert_eq!(
        next(&listener),
        RecordedEvent::new(DirectoryEvent::FileRemoved, "/dir", "f", 0)
    );
}

#[test]
fn test_directory_lifecycle() {
    let (tmp, engine) = setup();
    let listener = RecordingListener::new();
    engine.watch("/dir", &listener.as_listener()).unwrap();
    next(&listener);

    let sub = tmp.path().join("dir").join("s");
    fs::create_dir(&sub).unwrap();
    let added = next(&listener);
    assert_eq!(added.event, DirectoryEvent::DirectoryAdded);
    assert_eq!(added.name, "s");

    fs::remove_dir(&sub).unwrap();
    assert_eq!(
        next(&listener),
        RecordedEvent::new(DirectoryEvent::DirectoryRemoved, "/dir", "s", 0)
    );
}

#[test]
fn test_missing_directory_fails() {
    let (_tmp, engine) = setup();
    let listener = RecordingListener::new();
    let err = engine.watch("/nope", &listener.as_listener()).unwrap_err();
    assert!(matches!(err, WatchError::Listing { .. }));
    assert!(!engine.is_watching("/nope"));
}

#[test]
fn test_aliased_paths_share_one_watch() {
    let (tmp, engine) = setup();
    std::os::unix::fs::symlink(tmp.path().join("dir"), tmp.path().join("link")).unwrap();
    let a = RecordingListener::new();
    let b = RecordingListener::new();
    let c = RecordingListener::new();

    engine.watch("/dir", &a.as_listener()).unwrap();
    engine.watch("//dir", &b.as_listener()).unwrap();
    engine.watch("/link", &c.as_listener()).unwrap();
    assert_eq!(engine.watch_count(), 1);
    for listener in [&a, &b, &c] {
        assert_eq!(next(listener).event, DirectoryEvent::WatchingDirectory);
    }

    fs::write(tmp.path().join("dir").join("f1"), b"").unwrap();
    for listener in [&a, &b, &c] {
        let added = next(listener);
        assert_eq!(added.event, DirectoryEvent::FileAdded);
        assert_eq!((added.dir.as_str(), added.name.as_str()), ("/dir", "f1"));
    }

    engine.stop_watching("//dir", &b.as_listener());
    engine.stop_watching("/link", &c.as_listener());
    assert!(engine.is_watching("/dir"));

    fs::write(tmp.path().join("dir").join("f2"), b"").unwrap();
    let added = next(&a);
    assert_eq!(added.event, DirectoryEvent::FileAdded);
    assert_eq!(added.name, "f2");
}

#[test]
fn test_stop_watching_silences_listener() {
    let (tmp, engine) = setup();
    let listener = RecordingListener::new();
    engine.watch("/dir", &listener.as_listener()).unwrap();
    engine.stop_watching("/dir", &listener.as_listener());
    assert!(engine.is_suspended());

    fs::write(tmp.path().join("dir").join("late"), b"").unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(listener.events().len(), 1);
}

#[test]
fn test_drop_while_blocked_is_bounded() {
    let (_tmp, engine) = setup();
    let listener = RecordingListener::new();
    engine.watch("/dir", &listener.as_listener()).unwrap();
    // Let the polling thread block in poll(2)
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    drop(engine);
    assert!(started.elapsed() < EVENT_TIMEOUT);
}
