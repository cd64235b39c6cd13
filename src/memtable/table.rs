//! MemTable implementation
//!
//! Multi-version BTreeMap with RwLock for concurrency.
//!
//! ```text
//! ("a", seq 7) → "new"      newest version first within a key
//! ("a", seq 3) → "old"      kept only while a snapshot may still read it
//! ("b", seq 5) → "x"
//! ```
//!
//! Every `apply` call stamps its entries with one new sequence number. A
//! snapshot remembers the sequence number current when it was taken and
//! skips versions stamped later, so taking one never copies the map.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Map key: user key, then sequence number descending
type VersionedKey = (Vec<u8>, Reverse<u64>);

struct Inner {
    data: RwLock<BTreeMap<VersionedKey, Vec<u8>>>,
    /// Sequence number of the last applied batch
    seq: AtomicU64,
    /// Approximate size in bytes (keys + values of every stored version)
    size: AtomicUsize,
    /// Distinct user keys
    keys: AtomicUsize,
    /// Live snapshots; while any exist, superseded versions are kept
    snapshots: AtomicUsize,
}

/// In-memory table for recent writes
///
/// Each memtable is tied to the WAL segment (and later the SSTable) with the
/// same `id`.
pub struct MemTable {
    id: u64,
    inner: Arc<Inner>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new(id: u64) -> Self {
        Self {
            id,
            inner: Arc::new(Inner {
                data: RwLock::new(BTreeMap::new()),
                seq: AtomicU64::new(0),
                size: AtomicUsize::new(0),
                keys: AtomicUsize::new(0),
                snapshots: AtomicUsize::new(0),
            }),
        }
    }

    /// Segment id this memtable belongs to
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the newest value for a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let data = self.inner.data.read();
        newest_visible(&data, key, u64::MAX)
    }

    /// Put a key-value pair (write lock), returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.apply(vec![(key, value)])
    }

    /// Insert several pairs under a single write-lock acquisition
    ///
    /// Readers observe either none or all of `entries`.
    pub fn apply(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> usize {
        let inner = &self.inner;
        let mut data = inner.data.write();
        let seq = inner.seq.load(Ordering::Acquire) + 1;
        // Snapshots register under the read lock, so this count is stable here
        let pinned = inner.snapshots.load(Ordering::Acquire) > 0;

        let mut added = 0usize;
        let mut removed = 0usize;
        for (key, value) in entries {
            let older: Vec<VersionedKey> = data
                .range(versions_of(&key))
                .map(|(k, _)| k.clone())
                .filter(|(_, Reverse(s))| *s != seq)
                .collect();
            let had_key = !older.is_empty() || data.contains_key(&(key.clone(), Reverse(seq)));
            if !had_key {
                inner.keys.fetch_add(1, Ordering::AcqRel);
            }
            if !pinned {
                for old in older {
                    if let Some(v) = data.remove(&old) {
                        removed += old.0.len() + v.len();
                    }
                }
            }

            let key_len = key.len();
            added += key_len + value.len();
            if let Some(old) = data.insert((key, Reverse(seq)), value) {
                // Same key twice in one batch
                removed += key_len + old.len();
            }
        }

        inner.seq.store(seq, Ordering::Release);

        // Writers are serialized by the map lock, so load-then-store is safe
        let new_size = (inner.size.load(Ordering::Acquire) + added).saturating_sub(removed);
        inner.size.store(new_size, Ordering::Release);
        new_size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.size.load(Ordering::Acquire)
    }

    /// Number of distinct keys
    pub fn entry_count(&self) -> usize {
        self.inner.keys.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Point-in-time view of every entry
    ///
    /// Costs one read-lock acquisition; later writes stay invisible to it.
    pub fn snapshot(&self) -> Snapshot {
        let _data = self.inner.data.read();
        self.inner.snapshots.fetch_add(1, Ordering::AcqRel);
        Snapshot {
            inner: Arc::clone(&self.inner),
            seq: self.inner.seq.load(Ordering::Acquire),
        }
    }
}

/// Immutable view of a memtable at one point in time
pub struct Snapshot {
    inner: Arc<Inner>,
    seq: u64,
}

impl Snapshot {
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let data = self.inner.data.read();
        newest_visible(&data, key, self.seq)
    }

    /// First entry with a key >= `key`
    pub fn seek(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        self.first_from(Bound::Included((key.to_vec(), Reverse(u64::MAX))))
    }

    /// First entry with a key > `key`
    pub fn next_after(&self, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
        // Sequence numbers start at 1, so (key, 0) sorts after every version of key
        self.first_from(Bound::Excluded((key.to_vec(), Reverse(0))))
    }

    fn first_from(&self, lower: Bound<VersionedKey>) -> Option<(Vec<u8>, Vec<u8>)> {
        let data = self.inner.data.read();
        data.range((lower, Bound::Unbounded))
            .find(|((_, Reverse(s)), _)| *s <= self.seq)
            .map(|((k, _), v)| (k.clone(), v.clone()))
    }

    /// Every visible entry in sorted key order
    pub fn iter(&self) -> SnapshotIter<'_> {
        SnapshotIter {
            snapshot: self,
            last: None,
            done: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seek(&[]).is_none()
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.inner.snapshots.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Sorted walk over a [`Snapshot`]; each step takes the read lock briefly
pub struct SnapshotIter<'a> {
    snapshot: &'a Snapshot,
    last: Option<Vec<u8>>,
    done: bool,
}

impl Iterator for SnapshotIter<'_> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = match &self.last {
            Some(key) => self.snapshot.next_after(key),
            None => self.snapshot.seek(&[]),
        };
        match &next {
            Some((key, _)) => self.last = Some(key.clone()),
            None => self.done = true,
        }
        next
    }
}

fn versions_of(key: &[u8]) -> (Bound<VersionedKey>, Bound<VersionedKey>) {
    (
        Bound::Included((key.to_vec(), Reverse(u64::MAX))),
        Bound::Included((key.to_vec(), Reverse(0))),
    )
}

fn newest_visible(data: &BTreeMap<VersionedKey, Vec<u8>>, key: &[u8], seq: u64) -> Option<Vec<u8>> {
    data.range(versions_of(key))
        .find(|((_, Reverse(s)), _)| *s <= seq)
        .map(|(_, v)| v.clone())
}
