//! # tallykv
//!
//! An embedded store for financial transactions and audit logs, served over
//! a small length-framed JSON protocol:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - Atomic write batches and snapshot iterators
//! - Day-prefixed keys for ordered time-range scans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │          (accept loop + worker pool, one request each)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ framed JSON
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Service → Record Store                       │
//! │        (TransactionStore / LogStore, coarse write lock)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ keys + encoded records
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod engine;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod keys;
pub mod record;
pub mod store;

pub mod network;
pub mod protocol;
pub mod service;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::{Engine, EngineIterator, WriteBatch};
pub use error::{Result, TallyError};
pub use record::{Codec, Log, Transaction};
pub use service::{ServerMode, Service};
pub use store::{LogStore, TransactionStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tallykv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
