#![cfg(target_os = "linux")]

use std::fs;

use tempfile::TempDir;
use treewatch::paths;
use treewatch::watcher::{EventMask, InotifySource, WatchSource};

#[test]
fn test_reports_created_entries() {
    let temp_dir = TempDir::new().unwrap();
    let root = paths::canonicalize(temp_dir.path().to_str().unwrap()).unwrap();

    let mut source = InotifySource::new().unwrap();
    let handle = source.add_watch(&root, EventMask::DEFAULT).unwrap();

    fs::create_dir(temp_dir.path().join("fresh")).unwrap();
    fs::write(temp_dir.path().join("note.txt"), "hello").unwrap();

    let mut events = Vec::new();
    while events.len() < 2 {
        events.extend(source.read_events().unwrap());
    }

    let dir_event = events.iter().find(|e| e.name == "fresh").unwrap();
    assert_eq!(dir_event.handle, handle);
    assert!(dir_event.is_dir());
    assert!(dir_event.mask.contains(EventMask::CREATE));

    let file_event = events.iter().find(|e| e.name == "note.txt").unwrap();
    assert!(!file_event.is_dir());
    assert!(file_event.mask.contains(EventMask::CREATE));
}

#[test]
fn test_removed_watch_is_released() {
    let temp_dir = TempDir::new().unwrap();
    let root = paths::canonicalize(temp_dir.path().to_str().unwrap()).unwrap();

    let mut source = InotifySource::new().unwrap();
    let handle = source.add_watch(&root, EventMask::DEFAULT).unwrap();

    source.remove_watch(&handle).unwrap();
    assert!(source.remove_watch(&handle).is_err());
}

#[test]
fn test_missing_directory_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent");

    let mut source = InotifySource::new().unwrap();
    assert!(
        source
            .add_watch(missing.to_str().unwrap(), EventMask::DEFAULT)
            .is_err()
    );
}
