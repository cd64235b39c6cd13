//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered, point-in-time snapshots for iterators and SSTable creation
//!
//! ## Data Structure Choice
//! A `BTreeMap` of sequence-stamped versions wrapped in an RwLock:
//! - Ordered keys (required for SSTable generation and seeks)
//! - A snapshot is a sequence number, so taking one costs nothing and
//!   writes made while it is alive never copy the map

mod table;

pub use table::{MemTable, Snapshot, SnapshotIter};
