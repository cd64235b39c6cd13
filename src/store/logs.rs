//! Log store
//!
//! Logs are keyed by reference. A single insert refuses to overwrite an
//! existing reference; a batch insert overwrites blindly.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{Engine, WriteBatch};
use crate::error::{Result, TallyError};
use crate::keys;
use crate::record::{Codec, Log};

pub struct LogStore {
    engine: Arc<Engine>,
    /// Makes check-then-put atomic across connections
    write_lock: Mutex<()>,
}

impl LogStore {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            write_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Store a log unless its reference is already taken
    ///
    /// Fails with [`TallyError::DuplicateKey`] and leaves the store unchanged
    /// when the reference exists.
    pub fn insert(&self, log: &Log) -> Result<()> {
        log.validate()?;
        let key = keys::log_key(log.reference());

        let _guard = self.write_lock.lock();
        if self.engine.get(key)?.is_some() {
            return Err(TallyError::DuplicateKey(log.reference().to_string()));
        }
        self.engine.put(key, &log.encode())
    }

    /// Store every log in one atomic batch, overwriting existing references
    pub fn batch_insert(&self, logs: &[Log]) -> Result<usize> {
        for log in logs {
            log.validate()?;
        }

        let mut batch = WriteBatch::with_capacity(logs.len());
        for log in logs {
            batch.put(keys::log_key(log.reference()), log.encode());
        }

        let _guard = self.write_lock.lock();
        self.engine.write_batch(batch)?;

        tracing::debug!(count = logs.len(), "batch insert");
        Ok(logs.len())
    }

    pub fn get_by_reference(&self, reference: &str) -> Result<Option<Log>> {
        self.engine
            .get(keys::log_key(reference))?
            .map(|bytes| Log::decode(&bytes))
            .transpose()
    }

    /// Logs with `start_ms <= timestamp <= end_ms`, in reference order
    ///
    /// Log keys carry no time component, so this reads every log.
    pub fn range_query(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Log>> {
        self.scan(|log| log.timestamp() >= start_ms && log.timestamp() <= end_ms)
    }

    /// Every readable log, in reference order
    pub fn get_all(&self) -> Result<Vec<Log>> {
        self.scan(|_| true)
    }

    fn scan(&self, keep: impl Fn(&Log) -> bool) -> Result<Vec<Log>> {
        let mut results = Vec::new();

        let mut iter = self.engine.iter();
        iter.seek_to_first()?;
        while let Some((key, value)) = iter.entry() {
            match Log::decode(value) {
                Ok(log) if keep(&log) => results.push(log),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(key = %String::from_utf8_lossy(key), error = %e, "skipping unreadable log");
                }
            }
            iter.next()?;
        }

        Ok(results)
    }
}
