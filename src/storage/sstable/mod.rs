//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Header (15 bytes)                                                    │
//! │   Magic: "TLKV" (4) | Version: u16 (2) | Compression: u8 (1)         │
//! │   | Count: u64 (8)                                                   │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                                │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                             │
//! │   ... repeated for each entry, values stored per the compression ... │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                               │
//! │   [KeyLen: u32][Offset: u64][Key]                                    │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                                    │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4)              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::Compression;
use crate::error::{Result, TallyError};

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a tallykv SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"TLKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Compression (1) + EntryCount (8)
pub(crate) const HEADER_SIZE: u64 = 15;

/// Offset of the entry count inside the header
pub(crate) const ENTRY_COUNT_OFFSET: u64 = 7;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Shared cache of decoded values, keyed by (table id, entry offset)
pub type ValueCache = quick_cache::sync::Cache<(u64, u64), Bytes>;

/// Create a value cache, or none when `capacity` is zero
pub fn new_value_cache(capacity: usize) -> Option<Arc<ValueCache>> {
    (capacity > 0).then(|| Arc::new(ValueCache::new(capacity)))
}

// =============================================================================
// Value Compression
// =============================================================================

impl From<Compression> for u8 {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => 0,
            Compression::Lz4 => 1,
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = TallyError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            _ => Err(TallyError::Storage(format!(
                "Invalid compression type: {}",
                value
            ))),
        }
    }
}

pub(crate) fn compress_value(value: &[u8], compression: Compression) -> Vec<u8> {
    match compression {
        Compression::None => value.to_vec(),
        Compression::Lz4 => lz4_flex::compress_prepend_size(value),
    }
}

pub(crate) fn decompress_value(stored: Vec<u8>, compression: Compression) -> Result<Bytes> {
    match compression {
        Compression::None => Ok(Bytes::from(stored)),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(&stored)
            .map(Bytes::from)
            .map_err(|e| TallyError::Storage(format!("LZ4 decompression failed: {}", e))),
    }
}

// =============================================================================
// SSTable Metadata
// =============================================================================

/// SSTable metadata returned by the builder
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.entry_count > 0 && key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}
