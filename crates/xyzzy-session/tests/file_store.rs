//! Integration tests for the JSON file store.
//!
//! Every test works in its own `tempfile` directory.

use std::fs;

use xyzzy_session::{FileStore, Session, SessionError, SessionStore};

fn session() -> Session {
    Session::new("3f1c", "s3cr3t", "amy")
}

#[test]
fn test_file_store_load_missing_file_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_file_store_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    store.save(&session()).unwrap();
    assert_eq!(store.load().unwrap(), Some(session()));
}

#[test]
fn test_file_store_save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("app").join("session.json");
    let store = FileStore::new(&path);
    store.save(&session()).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn test_file_store_save_replaces_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    store.save(&session()).unwrap();
    store.save(&Session::new("9a9a", "other", "bob")).unwrap();
    assert_eq!(store.load().unwrap().unwrap().name, "bob");
}

#[test]
fn test_file_store_clear_removes_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    store.save(&session()).unwrap();
    store.clear().unwrap();
    assert!(!store.path().exists());
    store.clear().unwrap();
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_file_store_corrupt_file_returns_corrupt_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    fs::write(&path, "{ not json").unwrap();
    let store = FileStore::new(&path);
    assert!(matches!(store.load(), Err(SessionError::Corrupt(_))));
}

#[test]
fn test_manager_restore_discards_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    fs::write(&path, "garbage").unwrap();

    let manager = xyzzy_session::SessionManager::restore(FileStore::new(&path));
    assert!(!manager.is_active());
    assert!(!path.exists());
}

#[test]
fn test_manager_restore_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    store.save(&session()).unwrap();

    let manager = xyzzy_session::SessionManager::restore(store);
    assert_eq!(manager.current(), Some(&session()));
}
