//! Transaction store
//!
//! Every transaction is written twice in one atomic batch: under its primary
//! key `day:id` and under the id index `#id:id`, whose value is the primary
//! key. See [`crate::keys`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{Engine, WriteBatch};
use crate::error::Result;
use crate::keys;
use crate::record::{Codec, Transaction};

pub struct TransactionStore {
    engine: Arc<Engine>,
    /// Held around every mutation
    write_lock: Mutex<()>,
}

impl TransactionStore {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            write_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Store one transaction, overwriting any record with the same day and id
    pub fn insert(&self, tx: &Transaction) -> Result<()> {
        tx.validate()?;

        let mut batch = WriteBatch::with_capacity(2);
        Self::stage(&mut batch, tx);

        let _guard = self.write_lock.lock();
        self.engine.write_batch(batch)
    }

    /// Store every transaction in one atomic batch
    ///
    /// If any record is invalid nothing is written.
    pub fn bulk_insert(&self, txs: &[Transaction]) -> Result<usize> {
        for tx in txs {
            tx.validate()?;
        }

        let mut batch = WriteBatch::with_capacity(txs.len() * 2);
        for tx in txs {
            Self::stage(&mut batch, tx);
        }

        let _guard = self.write_lock.lock();
        self.engine.write_batch(batch)?;

        tracing::debug!(count = txs.len(), "bulk insert");
        Ok(txs.len())
    }

    fn stage(batch: &mut WriteBatch, tx: &Transaction) {
        let primary = keys::transaction_key(tx.timestamp(), tx.id());
        batch.put(primary.as_bytes(), tx.encode());
        batch.put(keys::transaction_index_key(tx.id()), primary);
    }

    /// Look up by id and the timestamp it was stored with
    ///
    /// Any timestamp on the same UTC day finds the record.
    pub fn get(&self, id: &str, timestamp: i64) -> Result<Option<Transaction>> {
        let key = keys::transaction_key(timestamp, id);
        self.read(key.as_bytes())
    }

    /// Look up by id alone, through the id index
    pub fn get_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let index_key = keys::transaction_index_key(id);
        match self.engine.get(index_key.as_bytes())? {
            Some(primary) => self.read(&primary),
            None => Ok(None),
        }
    }

    fn read(&self, key: &[u8]) -> Result<Option<Transaction>> {
        self.engine
            .get(key)?
            .map(|bytes| Transaction::decode(&bytes))
            .transpose()
    }

    /// All transactions with `start <= timestamp <= end`, in key order
    ///
    /// Seeks to the first day of the range and walks forward until the first
    /// key past the last day. Inside a day keys sort by id rather than time,
    /// so the timestamp bound is applied as a filter.
    pub fn range_query(&self, start: i64, end: i64) -> Result<Vec<Transaction>> {
        let mut results = Vec::new();
        if start > end {
            return Ok(results);
        }

        let start_day = keys::range_key(start);
        let end_day = keys::range_key(end);

        let mut iter = self.engine.iter();
        iter.seek(start_day.as_bytes())?;

        while let Some((key, value)) = iter.entry() {
            let Some(day) = keys::day_of_key(key) else {
                iter.next()?;
                continue;
            };
            if day > end_day.as_str() {
                break;
            }

            match Transaction::decode(value) {
                Ok(tx) if tx.timestamp() >= start && tx.timestamp() <= end => results.push(tx),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(key = %String::from_utf8_lossy(key), error = %e, "skipping unreadable transaction");
                }
            }
            iter.next()?;
        }

        Ok(results)
    }
}
