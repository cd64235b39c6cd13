//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::Compression;
use crate::error::{Result, TallyError};

use super::{compress_value, SSTable, ENTRY_COUNT_OFFSET, HEADER_SIZE, MAGIC, VERSION};

/// Builder for creating new SSTables from sorted entries
///
/// Entries go to `<path>.tmp`; `finish()` renames it into place, so a crash
/// mid-build never leaves a half-written table under the final name.
pub struct SSTableBuilder {
    /// Final file path
    path: PathBuf,
    /// Temporary file being written
    tmp_path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    compression: Compression,
    /// Number of entries written
    entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: key → file offset of entry
    index: Vec<(Vec<u8>, u64)>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()` in sorted order, then
    /// `finish()` to write index and footer.
    pub fn new(path: &Path, compression: Compression) -> Result<Self> {
        let tmp_path = Self::tmp_path_for(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        // Write header (entry_count placeholder, will be updated in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&[u8::from(compression)])?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            compression,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Temporary path used while a table is being built
    pub fn tmp_path_for(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Add a key-value pair (must be called in strictly increasing key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(TallyError::Storage(
                    "SSTable keys must be added in strictly increasing order".to_string(),
                ));
            }
        }

        self.index.push((key.to_vec(), self.current_offset));

        let stored = compress_value(value, self.compression);

        // Entry bytes: [key_len(4)][val_len(4)][key][value]
        let key_len_bytes = (key.len() as u32).to_le_bytes();
        let val_len_bytes = (stored.len() as u32).to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;
        self.writer.write_all(&stored)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);
        self.data_hasher.update(&stored);

        self.current_offset += 8 + key.len() as u64 + stored.len() as u64;
        self.entry_count += 1;

        Ok(())
    }

    /// Finish building: write index block, footer, rename into place, and
    /// return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        // Index block: [key_len(4)][offset(8)][key] for each entry
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();

        // Footer: index_offset (8) + data_crc (4) + padding (4)
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            TallyError::Storage(format!("Failed to flush SSTable: {}", e))
        })?;
        file.seek(SeekFrom::Start(ENTRY_COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        if let Some(dir) = self.path.parent() {
            // Persist the rename itself
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }

        let min_key = self.index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = self.index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}
