//! Storage Module
//!
//! Persistent storage layer using an SSTable format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Efficient seeks and point lookups through an in-memory index
//! - Optional LZ4 value compression and a shared value cache
//!
//! See [`sstable`] for the file layout.

pub mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
