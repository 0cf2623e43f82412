//! Tests for PartStore
//!
//! These tests verify:
//! - Storing exactly the announced bytes
//! - Overwrite, open, delete and listing
//! - No partial file after a short stream
//! - Rejection of unsafe part names

use std::fs;
use std::io::{Cursor, Read};

use atlasfs::node::PartStore;
use atlasfs::AtlasError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, PartStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = PartStore::open(&temp_dir.path().join("storage")).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_open_creates_root() {
    let (temp_dir, store) = setup_temp_store();

    assert!(temp_dir.path().join("storage").is_dir());
    assert_eq!(store.root(), temp_dir.path().join("storage"));
}

#[test]
fn test_store_reads_exactly_length() {
    let (_temp, store) = setup_temp_store();
    let mut reader = Cursor::new(b"01234TRAILING".to_vec());

    let written = store.store("hello.txt.part1", 5, &mut reader).unwrap();

    assert_eq!(written, 5);
    assert_eq!(fs::read(store.root().join("hello.txt.part1")).unwrap(), b"01234");

    let mut rest = String::new();
    reader.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "TRAILING");
}

#[test]
fn test_store_overwrites() {
    let (_temp, store) = setup_temp_store();

    store.store("p", 3, &mut Cursor::new(b"old".to_vec())).unwrap();
    store.store("p", 2, &mut Cursor::new(b"nw".to_vec())).unwrap();

    assert_eq!(fs::read(store.root().join("p")).unwrap(), b"nw");
}

#[test]
fn test_store_empty_part() {
    let (_temp, store) = setup_temp_store();

    store.store("empty.part1", 0, &mut Cursor::new(Vec::new())).unwrap();

    assert!(store.contains("empty.part1"));
    let (_, length) = store.open_part("empty.part1").unwrap().unwrap();
    assert_eq!(length, 0);
}

#[test]
fn test_short_stream_leaves_no_file() {
    let (_temp, store) = setup_temp_store();

    let result = store.store("short.part1", 10, &mut Cursor::new(b"abc".to_vec()));

    assert!(result.is_err());
    assert!(!store.contains("short.part1"));
}

#[test]
fn test_store_rejects_unsafe_names() {
    let (_temp, store) = setup_temp_store();

    for name in ["../escape", "a/b", "..", "", "a,b"] {
        let result = store.store(name, 1, &mut Cursor::new(b"x".to_vec()));
        assert!(
            matches!(result, Err(AtlasError::InvalidName(_))),
            "accepted {:?}",
            name
        );
    }
}

// =============================================================================
// Open / Delete / List Tests
// =============================================================================

#[test]
fn test_open_part() {
    let (_temp, store) = setup_temp_store();
    store.store("p1", 4, &mut Cursor::new(b"data".to_vec())).unwrap();

    let (mut file, length) = store.open_part("p1").unwrap().unwrap();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).unwrap();

    assert_eq!(length, 4);
    assert_eq!(contents, b"data");
    assert!(store.open_part("missing").unwrap().is_none());
}

#[test]
fn test_delete() {
    let (_temp, store) = setup_temp_store();
    store.store("p1", 1, &mut Cursor::new(b"x".to_vec())).unwrap();

    assert!(store.delete("p1").unwrap());
    assert!(!store.contains("p1"));
    assert!(!store.delete("p1").unwrap());
}

#[test]
fn test_list_parts_sorted() {
    let (_temp, store) = setup_temp_store();
    for name in ["b.part1", "a.part2", "a.part1"] {
        store.store(name, 1, &mut Cursor::new(b"x".to_vec())).unwrap();
    }

    assert_eq!(store.list_parts().unwrap(), vec!["a.part1", "a.part2", "b.part1"]);
}
