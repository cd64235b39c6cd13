//! Storage Manager
//!
//! Owns the SSTable directory and turns memtable snapshots into tables.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Create new SSTables from MemTable flushes
//! - Share one value cache between every open reader
//! - Track SSTable file naming and cleanup
//!
//! The live list of tables belongs to the engine's version, so that readers
//! see memtables and tables change under a single lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Compression;
use crate::error::Result;
use crate::memtable::Snapshot;

use super::sstable::{new_value_cache, SSTableBuilder, SSTableReader, ValueCache};

/// Manages the on-disk storage layer
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Compression applied to newly built tables
    compression: Compression,

    /// Value cache shared by every reader this manager opens
    cache: Option<Arc<ValueCache>>,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// Leftover `.tmp` files from an interrupted build are removed.
    pub fn open(path: &Path, compression: Compression, cache_capacity: usize) -> Result<Self> {
        fs::create_dir_all(path)?;

        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().map_or(false, |ext| ext == "tmp") {
                tracing::warn!(path = %file_path.display(), "removing incomplete SSTable");
                fs::remove_file(&file_path)?;
            }
        }

        Ok(Self {
            data_dir: path.to_path_buf(),
            compression,
            cache: new_value_cache(cache_capacity),
        })
    }

    /// Open readers for every SSTable in the directory, ordered newest → oldest
    pub fn load_existing(&self) -> Result<Vec<Arc<SSTableReader>>> {
        let mut ids = self.sstable_ids()?;
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut readers = Vec::with_capacity(ids.len());
        for id in ids {
            readers.push(self.open_reader(id)?);
        }
        Ok(readers)
    }

    /// IDs of all SSTables on disk (unordered)
    pub fn sstable_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Whether the SSTable with this id has been fully written
    pub fn contains(&self, id: u64) -> bool {
        self.sstable_path(id).is_file()
    }

    /// Write a memtable snapshot to SSTable `id` and open a reader for it
    pub fn flush(&self, id: u64, snapshot: &Snapshot) -> Result<Arc<SSTableReader>> {
        let path = self.sstable_path(id);

        // Snapshots iterate in key order
        let mut builder = SSTableBuilder::new(&path, self.compression)?;
        for (key, value) in snapshot.iter() {
            builder.add(&key, &value)?;
        }
        let metadata = builder.finish()?;

        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "flushed memtable to SSTable"
        );

        self.open_reader(id)
    }

    fn open_reader(&self, id: u64) -> Result<Arc<SSTableReader>> {
        let path = self.sstable_path(id);
        let reader = SSTableReader::open_with_cache(&path, id, self.cache.clone())?;
        Ok(Arc::new(reader))
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Generate the file path for an SSTable with given ID
    pub fn sstable_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
