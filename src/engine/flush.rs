//! Memtable flushing
//!
//! Frozen memtables are queued on a bounded channel and turned into SSTables
//! by a small pool of background threads. A full queue blocks the writer,
//! which bounds the number of frozen memtables held in memory.

use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Sender};

use crate::error::Result;
use crate::memtable::MemTable;

use super::{wal_path, Shared};

/// Start `jobs` flusher threads draining one queue
pub(crate) fn spawn_flushers(
    shared: &Arc<Shared>,
    jobs: usize,
) -> Result<(Sender<Arc<MemTable>>, Vec<JoinHandle<()>>)> {
    let (tx, rx) = bounded::<Arc<MemTable>>(jobs);

    let mut handles = Vec::with_capacity(jobs);
    for i in 0..jobs {
        let rx = rx.clone();
        let shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("tallykv-flush-{}", i))
            .spawn(move || {
                for memtable in rx.iter() {
                    if let Err(e) = flush_memtable(&shared, &memtable) {
                        // The memtable stays readable and its WAL segment
                        // stays on disk, so nothing is lost
                        tracing::error!(id = memtable.id(), error = %e, "background flush failed");
                    }
                }
            })?;
        handles.push(handle);
    }

    Ok((tx, handles))
}

/// Write `memtable` to the SSTable with the same id, install it, and drop
/// the memtable's WAL segment
pub(crate) fn flush_memtable(shared: &Shared, memtable: &Arc<MemTable>) -> Result<()> {
    let id = memtable.id();
    let snapshot = memtable.snapshot();

    let table = if snapshot.is_empty() {
        None
    } else {
        Some(shared.storage.flush(id, &snapshot)?)
    };

    {
        let mut version = shared.version.write();
        if let Some(table) = table {
            // Flushers can finish out of order; keep newest (highest id) first
            let pos = version.sstables.partition_point(|t| t.id() > id);
            version.sstables.insert(pos, table);
        }
        version.immutable.retain(|m| m.id() != id);
    }

    match fs::remove_file(wal_path(&shared.data_dir, id)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
