//! Engine Module
//!
//! The ordered key-value engine that coordinates all storage components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Apply write batches atomically
//! - Hand full memtables to background flushers
//! - Manage crash recovery on startup
//!
//! ## Files
//! ```text
//! {data_dir}/
//!   ├── wal_000007.log        WAL segment of memtable 7 (active or frozen)
//!   └── sstables/
//!       └── sstable_000006.sst  flushed from memtable 6
//! ```
//! A memtable, its WAL segment and the SSTable it becomes all share one id,
//! and ids only grow, so "newest wins" is simply "highest id wins".

mod batch;
mod flush;
mod iterator;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::Sender;
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, TallyError};
use crate::memtable::MemTable;
use crate::storage::{SSTableIterator, SSTableReader, StorageManager};
use crate::wal::{Operation, WalRecovery, WalWriter};

pub use batch::WriteBatch;
pub use iterator::EngineIterator;

use iterator::{MemCursor, Source};

/// Everything a reader needs, swapped as one unit
#[derive(Clone)]
pub(crate) struct Version {
    /// Memtable receiving writes
    active: Arc<MemTable>,
    /// Frozen memtables waiting for flush, newest first
    immutable: Vec<Arc<MemTable>>,
    /// Open SSTables, newest first
    sstables: Vec<Arc<SSTableReader>>,
}

/// State shared with the background flushers
pub(crate) struct Shared {
    data_dir: PathBuf,
    version: RwLock<Version>,
    storage: StorageManager,
}

/// Write side, serialized by one mutex
struct WriteState {
    wal: WalWriter,
    /// Id for the next memtable / WAL segment
    next_id: u64,
}

/// The ordered key-value engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/write_batch/flush): serialized by the `writer` mutex,
///   which also owns the WAL. Order: WAL append → memtable apply →
///   rotate if full.
/// - **Reads** (get/iter): take the version read lock just long enough to
///   clone a handful of `Arc`s, then read without holding any engine lock.
/// - **Flushers**: build SSTables off the write path, then swap the version
///   under its write lock.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all SSTables
    storage_dir: PathBuf,

    shared: Arc<Shared>,

    writer: Mutex<WriteState>,

    /// Queue feeding the flusher threads (`None` = inline flush)
    flush_tx: Option<Sender<Arc<MemTable>>>,
    flushers: Vec<JoinHandle<()>>,

    closed: bool,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Replay leftover WAL segments into SSTables
    /// 3. Load existing SSTables
    /// 4. Start a fresh WAL segment and the flusher threads
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let storage =
            StorageManager::open(&storage_dir, config.compression, config.cache_capacity)?;

        let segment_ids = Self::recover_segments(&config.data_dir, &storage)?;

        let sstables = storage.load_existing()?;
        let max_id = sstables
            .iter()
            .map(|t| t.id())
            .chain(segment_ids)
            .max()
            .unwrap_or(0);

        let active_id = max_id + 1;
        let wal = WalWriter::open(&wal_path(&config.data_dir, active_id), config.wal_sync_strategy)?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sstables = sstables.len(),
            active_id,
            "engine opened"
        );

        let shared = Arc::new(Shared {
            data_dir: config.data_dir.clone(),
            version: RwLock::new(Version {
                active: Arc::new(MemTable::new(active_id)),
                immutable: Vec::new(),
                sstables,
            }),
            storage,
        });

        let (flush_tx, flushers) = if config.background_jobs > 0 {
            let (tx, handles) = flush::spawn_flushers(&shared, config.background_jobs)?;
            (Some(tx), handles)
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            config,
            storage_dir,
            shared,
            writer: Mutex::new(WriteState {
                wal,
                next_id: active_id + 1,
            }),
            flush_tx,
            flushers,
            closed: false,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Replay every WAL segment left behind by the previous run
    ///
    /// Segment N becomes SSTable N. If SSTable N already exists the segment
    /// was flushed before the crash and is simply removed. Returns the ids
    /// seen so new ids never reuse them.
    fn recover_segments(data_dir: &Path, storage: &StorageManager) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(data_dir)? {
            let path = entry?.path();
            if let Some(id) = parse_wal_id(&path) {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        for &id in &ids {
            let path = wal_path(data_dir, id);

            if storage.contains(id) {
                fs::remove_file(&path)?;
                continue;
            }

            let (entries, result) = WalRecovery::recover(&path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    segment = id,
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    truncated = result.was_truncated,
                    "WAL recovery"
                );
            }

            let memtable = MemTable::new(id);
            for entry in entries {
                memtable.apply(entry.operation.into_pairs());
            }

            // Make recovered data durable in an SSTable before dropping the WAL
            if !memtable.is_empty() {
                storage.flush(id, &memtable.snapshot())?;
            }
            fs::remove_file(&path)?;
        }

        Ok(ids)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Active MemTable (most recent writes)
    /// 2. Frozen MemTables (newest to oldest)
    /// 3. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let version = self.shared.version.read().clone();

        if let Some(value) = version.active.get(key) {
            return Ok(Some(value));
        }
        for memtable in &version.immutable {
            if let Some(value) = memtable.get(key) {
                return Ok(Some(value));
            }
        }
        for table in &version.sstables {
            if let Some(value) = table.get(key)? {
                return Ok(Some(value.to_vec()));
            }
        }
        Ok(None)
    }

    /// Create an iterator over a point-in-time snapshot of the whole engine
    pub fn iter(&self) -> EngineIterator {
        let version = self.shared.version.read().clone();

        let mut sources = Vec::with_capacity(1 + version.immutable.len() + version.sstables.len());
        sources.push(Source::Mem(MemCursor::new(version.active.snapshot())));
        for memtable in &version.immutable {
            sources.push(Source::Mem(MemCursor::new(memtable.snapshot())));
        }
        for table in version.sstables {
            sources.push(Source::Table(SSTableIterator::new(table)));
        }

        EngineIterator::new(sources)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Apply every put in `batch` atomically
    ///
    /// The batch is one WAL entry and one memtable update: concurrent readers
    /// and crash recovery both see all of it or none of it.
    pub fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write(Operation::Batch {
            entries: batch.into_entries(),
        })
    }

    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (durability)
    /// 3. Write to MemTable
    /// 4. Rotate the memtable if it is full
    fn write(&self, operation: Operation) -> Result<()> {
        if self.closed {
            return Err(TallyError::Storage("engine is closed".to_string()));
        }

        let mut state = self.writer.lock();

        if let Err(e) = state.wal.append(operation.clone()) {
            if state.wal.is_poisoned() {
                // Every acknowledged write is in the active memtable; freezing it
                // retires the damaged segment once the flush lands
                if let Err(rotate_err) = self.rotate(&mut state, false) {
                    tracing::error!(error = %rotate_err, "could not retire damaged WAL segment");
                }
            }
            return Err(e);
        }

        let active = Arc::clone(&self.shared.version.read().active);
        let new_size = active.apply(operation.into_pairs());

        if new_size >= self.config.memtable_size_limit {
            // The write itself is already durable and visible; a failed
            // rotation is retried on the next write
            if let Err(e) = self.rotate(&mut state, false) {
                tracing::error!(error = %e, "memtable rotation failed");
            }
        }

        Ok(())
    }

    /// Freeze the active memtable and start a new one with a new WAL segment
    ///
    /// Called with the write lock held. The frozen memtable stays readable
    /// until its SSTable is installed.
    fn rotate(&self, state: &mut WriteState, inline: bool) -> Result<()> {
        state.wal.sync()?;

        let new_id = state.next_id;
        let new_wal = WalWriter::open(
            &wal_path(&self.config.data_dir, new_id),
            self.config.wal_sync_strategy,
        )?;
        state.next_id += 1;

        let frozen = {
            let mut version = self.shared.version.write();
            let frozen = std::mem::replace(&mut version.active, Arc::new(MemTable::new(new_id)));
            version.immutable.insert(0, Arc::clone(&frozen));
            frozen
        };
        state.wal = new_wal;

        tracing::debug!(
            frozen = frozen.id(),
            entries = frozen.entry_count(),
            bytes = frozen.size(),
            "memtable rotated"
        );

        match &self.flush_tx {
            Some(tx) if !inline => tx.send(frozen).map_err(|_| {
                TallyError::Storage("flusher threads are gone".to_string())
            }),
            _ => flush::flush_memtable(&self.shared, &frozen),
        }
    }

    /// Flush the active memtable to disk and wait for it
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let mut state = self.writer.lock();
        if self.shared.version.read().active.is_empty() {
            return Ok(());
        }
        self.rotate(&mut state, true)
    }

    /// Close the engine gracefully
    ///
    /// Drains the flushers, flushes any pending data and syncs to disk
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Closing the channel lets each flusher finish its queue and exit
        drop(self.flush_tx.take());
        for handle in self.flushers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("flusher thread panicked");
            }
        }

        let mut state = self.writer.lock();
        state.wal.sync()?;

        let active = Arc::clone(&self.shared.version.read().active);
        if !active.is_empty() {
            flush::flush_memtable(&self.shared, &active)?;
        }

        tracing::info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.shared.version.read().active.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.shared.version.read().active.entry_count()
    }

    /// Number of frozen memtables waiting for flush
    pub fn immutable_count(&self) -> usize {
        self.shared.version.read().immutable.len()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.shared.version.read().sstables.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "engine shutdown failed");
        }
    }
}

/// "wal_000042.log" inside `dir`
pub(crate) fn wal_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("wal_{:06}.log", id))
}

/// "wal_000042.log" → Some(42)
fn parse_wal_id(path: &Path) -> Option<u64> {
    if path.extension()? != "log" {
        return None;
    }
    let name = path.file_stem()?.to_string_lossy();
    name.strip_prefix("wal_")?.parse().ok()
}
