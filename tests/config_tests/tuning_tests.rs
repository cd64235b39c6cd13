//! Tuning File Tests

use std::path::Path;

use tallykv::config::{Compression, TuningFile, WalSyncStrategy};
use tallykv::{Config, TallyError};

#[test]
fn test_tuning_overrides_engine_and_server() {
    let yaml = r#"
engine:
  write_buffer_size: 1024
  compression: lz4
  block_cache_size: 16
  max_background_jobs: 0
  wal_sync: every_write
server:
  read_timeout_ms: 250
"#;
    let tuning = TuningFile::parse(yaml).unwrap();
    let config = Config::builder().tuning(&tuning).build();

    assert_eq!(config.memtable_size_limit, 1024);
    assert_eq!(config.compression, Compression::Lz4);
    assert_eq!(config.cache_capacity, 16);
    assert_eq!(config.background_jobs, 0);
    assert_eq!(config.wal_sync_strategy, WalSyncStrategy::EveryWrite);
    assert_eq!(config.read_timeout_ms, 250);
    assert_eq!(config.write_timeout_ms, 5000);
}

#[test]
fn test_empty_tuning_keeps_defaults() {
    let tuning = TuningFile::parse("").unwrap();
    assert_eq!(tuning, TuningFile::default());

    let config = Config::builder().tuning(&tuning).build();

    assert_eq!(config.memtable_size_limit, 64 * 1024 * 1024);
    assert_eq!(config.compression, Compression::None);
}

#[test]
fn test_every_n_entries_count() {
    let yaml = "engine:\n  wal_sync: every_n_entries\n  wal_sync_entries: 7\n";
    let tuning = TuningFile::parse(yaml).unwrap();
    let config = Config::builder().tuning(&tuning).build();

    assert_eq!(
        config.wal_sync_strategy,
        WalSyncStrategy::EveryNEntries { count: 7 }
    );
}

#[test]
fn test_unknown_keys_rejected() {
    let err = TuningFile::parse("engine:\n  bogus: 1\n").unwrap_err();
    assert!(matches!(err, TallyError::Config(_)));
}

#[test]
fn test_missing_file_is_config_error() {
    let err = TuningFile::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, TallyError::Config(_)));
}
