//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Compression;
use crate::error::{Result, TallyError};

use super::{decompress_value, ValueCache, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// The file handle sits behind a mutex so lookups only need `&self` and a
/// reader can be shared between concurrent iterators.
pub struct SSTableReader {
    /// Table id (also the id of the WAL segment it was flushed from)
    id: u64,
    path: PathBuf,
    /// File handle for reading entries
    file: Mutex<BufReader<File>>,
    /// In-memory index: (key, file offset), sorted by key
    index: Vec<(Vec<u8>, u64)>,
    compression: Compression,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
    cache: Option<Arc<ValueCache>>,
}

impl SSTableReader {
    /// Open an SSTable for reading without a value cache
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_cache(path, 0, None)
    }

    /// Open an SSTable for reading
    ///
    /// Loads the entire index into memory and verifies the data checksum.
    pub fn open_with_cache(path: &Path, id: u64, cache: Option<Arc<ValueCache>>) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(TallyError::Storage(format!(
                "SSTable too small: {} bytes",
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(TallyError::Storage(format!(
                "Invalid SSTable magic: expected TLKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(TallyError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let compression = Compression::try_from(header[6])?;
        let entry_count = read_u64(&header[7..15]);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer[0..8]);
        let data_crc = read_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(TallyError::Storage(format!(
                "Invalid SSTable index offset: {}",
                index_offset
            )));
        }

        // Verify the data block before trusting any offsets into it
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = index_offset - HEADER_SIZE;
        let mut chunk = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let n = remaining.min(chunk.len() as u64) as usize;
            file.read_exact(&mut chunk[..n])?;
            hasher.update(&chunk[..n]);
            remaining -= n as u64;
        }
        if hasher.finalize() != data_crc {
            return Err(TallyError::Storage(format!(
                "SSTable data checksum mismatch in {}",
                path.display()
            )));
        }

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][key]
        let mut index = Vec::with_capacity((entry_count as usize).min(index_data.len() / 12));
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(TallyError::Storage("Truncated SSTable index".to_string()));
            }
            let key_len = read_u32(&index_data[pos..pos + 4]) as usize;
            let offset = read_u64(&index_data[pos + 4..pos + 12]);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(TallyError::Storage("Truncated SSTable index".to_string()));
            }
            index.push((index_data[pos..pos + key_len].to_vec(), offset));
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(TallyError::Storage(format!(
                "SSTable index has {} entries, header says {}",
                index.len(),
                entry_count
            )));
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            compression,
            entry_count,
            index_offset,
            cache,
        })
    }

    /// Get a value by key — O(log n) lookup via in-memory index
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        if !self.might_contain(key) {
            return Ok(None);
        }
        match self.index.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
            Ok(pos) => self.value_at(pos).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Position of the first key >= `key` (may equal `len()`)
    pub fn lower_bound(&self, key: &[u8]) -> usize {
        self.index.partition_point(|(k, _)| k.as_slice() < key)
    }

    /// Key stored at index position `pos`
    pub fn key_at(&self, pos: usize) -> Option<&[u8]> {
        self.index.get(pos).map(|(k, _)| k.as_slice())
    }

    /// Value stored at index position `pos`, served from the cache when possible
    pub fn value_at(&self, pos: usize) -> Result<Bytes> {
        let offset = match self.index.get(pos) {
            Some((_, offset)) => *offset,
            None => {
                return Err(TallyError::Storage(format!(
                    "SSTable position {} out of range",
                    pos
                )))
            }
        };

        match &self.cache {
            Some(cache) => cache.get_or_insert_with(&(self.id, offset), || self.read_value(offset)),
            None => self.read_value(offset),
        }
    }

    fn read_value(&self, offset: u64) -> Result<Bytes> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let key_len = read_u32(&header[0..4]) as u64;
        let val_len = read_u32(&header[4..8]) as u64;

        if offset + 8 + key_len + val_len > self.index_offset {
            return Err(TallyError::Storage(format!(
                "SSTable entry at {} runs past the data block",
                offset
            )));
        }

        // Skip the key (the index already has it)
        file.seek(SeekFrom::Current(key_len as i64))?;

        let mut stored = vec![0u8; val_len as usize];
        file.read_exact(&mut stored)?;
        drop(file);

        decompress_value(stored, self.compression)
    }

    /// Table id
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.first().map(|(k, _)| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.last().map(|(k, _)| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
