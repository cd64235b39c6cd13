//! SSTable Iterator
//!
//! Seekable cursor over the entries of one SSTable, in sorted key order.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

use super::SSTableReader;

/// Cursor over SSTable entries
///
/// Keys come from the in-memory index; values are read (or fetched from the
/// cache) only when asked for.
pub struct SSTableIterator {
    reader: Arc<SSTableReader>,
    pos: usize,
}

impl SSTableIterator {
    /// Create a cursor positioned at the first entry
    pub fn new(reader: Arc<SSTableReader>) -> Self {
        Self { reader, pos: 0 }
    }

    /// Position at the first key >= `key`
    pub fn seek(&mut self, key: &[u8]) {
        self.pos = self.reader.lower_bound(key);
    }

    pub fn seek_to_first(&mut self) {
        self.pos = 0;
    }

    pub fn valid(&self) -> bool {
        self.pos < self.reader.len()
    }

    /// Current key, `None` once past the end
    pub fn key(&self) -> Option<&[u8]> {
        self.reader.key_at(self.pos)
    }

    /// Current value
    pub fn value(&self) -> Result<Bytes> {
        self.reader.value_at(self.pos)
    }

    /// Move to the next entry
    pub fn advance(&mut self) {
        if self.valid() {
            self.pos += 1;
        }
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<(Vec<u8>, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.key()?.to_vec();
        let item = self.value().map(|value| (key, value));
        self.advance();
        Some(item)
    }
}
