//! Configuration for tallykv
//!
//! Centralized configuration with sensible defaults, plus the optional YAML
//! tuning file that is read once at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, TallyError};

/// Main configuration for a tallykv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL segments, SSTables)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal_000007.log   (one segment per live memtable)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable / SSTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    /// Value compression used for newly written SSTables
    pub compression: Compression,

    /// Number of SSTable values kept in the shared read cache
    pub cache_capacity: usize,

    /// Background flusher threads (0 = flush inline on the write path)
    pub background_jobs: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections (size of the worker pool)
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Value compression for SSTables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Lz4,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tallykv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            compression: Compression::None,
            cache_capacity: 4096,
            background_jobs: 1,
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 64,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the SSTable value compression
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the SSTable value cache capacity (entries)
    pub fn cache_capacity(mut self, entries: usize) -> Self {
        self.config.cache_capacity = entries;
        self
    }

    /// Set the number of background flusher threads
    pub fn background_jobs(mut self, jobs: usize) -> Self {
        self.config.background_jobs = jobs;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Apply every value present in a tuning file, leaving the rest untouched
    pub fn tuning(mut self, tuning: &TuningFile) -> Self {
        let engine = &tuning.engine;
        if let Some(size) = engine.write_buffer_size {
            self.config.memtable_size_limit = size;
        }
        if let Some(compression) = engine.compression {
            self.config.compression = compression;
        }
        if let Some(entries) = engine.block_cache_size {
            self.config.cache_capacity = entries;
        }
        if let Some(jobs) = engine.max_background_jobs {
            self.config.background_jobs = jobs;
        }
        match engine.wal_sync {
            Some(WalSyncMode::EveryWrite) => {
                self.config.wal_sync_strategy = WalSyncStrategy::EveryWrite;
            }
            Some(WalSyncMode::EveryNEntries) => {
                let count = engine.wal_sync_entries.unwrap_or(100).max(1);
                self.config.wal_sync_strategy = WalSyncStrategy::EveryNEntries { count };
            }
            None => {}
        }

        let server = &tuning.server;
        if let Some(ms) = server.read_timeout_ms {
            self.config.read_timeout_ms = ms;
        }
        if let Some(ms) = server.write_timeout_ms {
            self.config.write_timeout_ms = ms;
        }
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Tuning File
// =============================================================================

/// Contents of the YAML tuning file
///
/// ```yaml
/// engine:
///   write_buffer_size: 67108864
///   compression: lz4
///   block_cache_size: 4096
///   max_background_jobs: 2
///   wal_sync: every_n_entries
///   wal_sync_entries: 100
/// server:
///   read_timeout_ms: 5000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningFile {
    pub engine: EngineTuning,
    pub server: ServerTuning,
}

/// Engine section of the tuning file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineTuning {
    pub write_buffer_size: Option<usize>,
    pub compression: Option<Compression>,
    pub block_cache_size: Option<usize>,
    pub max_background_jobs: Option<usize>,
    pub wal_sync: Option<WalSyncMode>,
    pub wal_sync_entries: Option<usize>,
}

/// Server section of the tuning file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerTuning {
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
}

/// WAL sync mode as spelled in the tuning file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalSyncMode {
    EveryWrite,
    EveryNEntries,
}

impl TuningFile {
    /// Parse a tuning document
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| TallyError::Config(format!("Failed to parse tuning file: {}", e)))
    }

    /// Load a tuning file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TallyError::Config(format!(
                "Failed to read tuning file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }
}
