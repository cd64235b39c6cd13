//! Write-Ahead Log (WAL)
//!
//! Every write is appended here before it reaches a memtable. Each memtable
//! owns one segment file, `wal_{id:06}.log`, which is deleted once the
//! memtable has been flushed to the SSTable with the same id.
//!
//! ## Frame Layout
//! ```text
//! ┌──────────┬──────────┬──────────┬────────────────────────┐
//! │ LSN (8)  │ CRC (4)  │ Len (4)  │ bincode(WalEntry)      │
//! └──────────┴──────────┴──────────┴────────────────────────┘
//!   CRC32 covers LSN + payload. All integers little-endian.
//! ```
//!
//! A write batch is one frame. On replay a frame with a bad checksum is
//! skipped, while a frame cut short by a crash ends the segment and is
//! truncated away, so half a batch is never applied.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use reader::{Frame, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::{SegmentFile, WalWriter};
