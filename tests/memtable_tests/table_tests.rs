//! Tests for MemTable
//!
//! These tests verify:
//! - Basic put/get operations
//! - Atomic multi-entry apply
//! - Size tracking for flush decisions
//! - Snapshots are isolated from later writes
//! - Concurrent access

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tallykv::memtable::MemTable;

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new(7);

    assert_eq!(memtable.id(), 7);
    assert!(memtable.is_empty());
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
}

#[test]
fn test_put_and_get() {
    let memtable = MemTable::new(1);
    memtable.put(b"key1".to_vec(), b"value1".to_vec());

    assert_eq!(memtable.get(b"key1"), Some(b"value1".to_vec()));
    assert_eq!(memtable.get(b"missing"), None);
}

#[test]
fn test_put_overwrites_existing() {
    let memtable = MemTable::new(1);
    memtable.put(b"key".to_vec(), b"old".to_vec());
    memtable.put(b"key".to_vec(), b"new".to_vec());

    assert_eq!(memtable.get(b"key"), Some(b"new".to_vec()));
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_empty_key_and_value() {
    let memtable = MemTable::new(1);
    memtable.put(Vec::new(), b"v".to_vec());
    memtable.put(b"k".to_vec(), Vec::new());

    assert_eq!(memtable.get(b""), Some(b"v".to_vec()));
    assert_eq!(memtable.get(b"k"), Some(Vec::new()));
}

// =============================================================================
// Apply Tests
// =============================================================================

#[test]
fn test_apply_inserts_all_entries() {
    let memtable = MemTable::new(1);
    memtable.apply(vec![
        (b"a".to_vec(), b"1".to_vec()),
        (b"b".to_vec(), b"2".to_vec()),
        (b"c".to_vec(), b"3".to_vec()),
    ]);

    assert_eq!(memtable.entry_count(), 3);
    assert_eq!(memtable.get(b"b"), Some(b"2".to_vec()));
}

#[test]
fn test_apply_later_entry_wins() {
    let memtable = MemTable::new(1);
    memtable.apply(vec![
        (b"a".to_vec(), b"first".to_vec()),
        (b"a".to_vec(), b"second".to_vec()),
    ]);

    assert_eq!(memtable.get(b"a"), Some(b"second".to_vec()));
    assert_eq!(memtable.entry_count(), 1);
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_tracking_put() {
    let memtable = MemTable::new(1);
    let size = memtable.put(b"key".to_vec(), b"value".to_vec());

    assert_eq!(size, 3 + 5);
    assert_eq!(memtable.size(), 8);
}

#[test]
fn test_size_tracking_overwrite() {
    let memtable = MemTable::new(1);
    memtable.put(b"key".to_vec(), b"short".to_vec());
    memtable.put(b"key".to_vec(), b"much longer value".to_vec());

    assert_eq!(memtable.size(), 3 + "much longer value".len());
}

#[test]
fn test_should_flush() {
    let memtable = MemTable::new(1);
    memtable.put(b"key".to_vec(), b"value".to_vec());

    assert!(!memtable.should_flush(100));
    assert!(memtable.should_flush(8));
    assert!(memtable.should_flush(1));
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_snapshot_sorted_order() {
    let memtable = MemTable::new(1);
    for key in ["c", "a", "b"] {
        memtable.put(key.as_bytes().to_vec(), b"v".to_vec());
    }

    let keys: Vec<_> = memtable.snapshot().iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_snapshot_ignores_later_writes() {
    let memtable = MemTable::new(1);
    memtable.put(b"a".to_vec(), b"1".to_vec());

    let snapshot = memtable.snapshot();
    memtable.put(b"a".to_vec(), b"2".to_vec());
    memtable.put(b"b".to_vec(), b"3".to_vec());

    assert_eq!(snapshot.iter().count(), 1);
    assert_eq!(snapshot.get(b"a"), Some(b"1".to_vec()));
    assert_eq!(snapshot.get(b"b"), None);
    assert_eq!(memtable.get(b"a"), Some(b"2".to_vec()));
    assert_eq!(memtable.entry_count(), 2);
}

#[test]
fn test_snapshot_seek_skips_newer_versions() {
    let memtable = MemTable::new(1);
    memtable.put(b"b".to_vec(), b"1".to_vec());

    let snapshot = memtable.snapshot();
    memtable.put(b"a".to_vec(), b"new".to_vec());
    memtable.put(b"b".to_vec(), b"2".to_vec());

    assert_eq!(snapshot.seek(b""), Some((b"b".to_vec(), b"1".to_vec())));
    assert_eq!(snapshot.next_after(b"b"), None);
    assert!(!snapshot.is_empty());
    assert!(memtable.snapshot().seek(b"a").is_some());
}

#[test]
fn test_superseded_versions_dropped_once_snapshots_end() {
    let memtable = MemTable::new(1);
    memtable.put(b"key".to_vec(), b"v1".to_vec());

    let snapshot = memtable.snapshot();
    memtable.put(b"key".to_vec(), b"v2".to_vec());
    // Both versions are held while the snapshot lives
    assert_eq!(memtable.size(), 2 * (3 + 2));
    drop(snapshot);

    memtable.put(b"key".to_vec(), b"v3".to_vec());
    assert_eq!(memtable.size(), 3 + 2);
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_writes_stay_cheap_while_snapshot_alive() {
    let memtable = MemTable::new(1);
    for i in 0..200_000u32 {
        memtable.put(i.to_be_bytes().to_vec(), b"value".to_vec());
    }

    let snapshot = memtable.snapshot();
    let start = Instant::now();
    for i in 0..200u32 {
        memtable.put(format!("new{}", i).into_bytes(), b"value".to_vec());
    }
    let elapsed = start.elapsed();

    // Copying 200k entries per write would take far longer than this
    assert!(elapsed < Duration::from_secs(2), "200 puts took {:?}", elapsed);
    assert_eq!(snapshot.get(b"new0"), None);
    assert_eq!(memtable.entry_count(), 200_200);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_reads() {
    let memtable = Arc::new(MemTable::new(1));
    memtable.put(b"key".to_vec(), b"value".to_vec());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let mt = Arc::clone(&memtable);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert_eq!(mt.get(b"key"), Some(b"value".to_vec()));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_writes() {
    let memtable = Arc::new(MemTable::new(1));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let mt = Arc::clone(&memtable);
            thread::spawn(move || {
                for j in 0..10 {
                    let key = format!("key{}_{}", i, j).into_bytes();
                    let value = format!("value{}_{}", i, j).into_bytes();
                    mt.put(key, value);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 100);
}

#[test]
fn test_readers_never_see_half_a_batch() {
    let memtable = Arc::new(MemTable::new(1));

    let writer = {
        let mt = Arc::clone(&memtable);
        thread::spawn(move || {
            for round in 0..200u32 {
                let value = round.to_le_bytes().to_vec();
                mt.apply(vec![
                    (b"left".to_vec(), value.clone()),
                    (b"right".to_vec(), value),
                ]);
            }
        })
    };

    for _ in 0..200 {
        let snapshot = memtable.snapshot();
        assert_eq!(snapshot.get(b"left"), snapshot.get(b"right"));
    }

    writer.join().unwrap();
}
