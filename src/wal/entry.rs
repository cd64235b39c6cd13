//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest payload a frame may claim; anything bigger is treated as garbage
pub const MAX_ENTRY_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Put several key-value pairs as one atomic unit
    Batch { entries: Vec<(Vec<u8>, Vec<u8>)> },
}

impl Operation {
    /// Visit every (key, value) pair carried by this operation
    pub fn into_pairs(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self {
            Operation::Put { key, value } => vec![(key, value)],
            Operation::Batch { entries } => entries,
        }
    }
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize into a complete frame (header + payload)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        if payload.len() as u64 > MAX_ENTRY_SIZE as u64 {
            return Err(TallyError::Serialization(format!(
                "WAL entry too large: {} bytes (max {})",
                payload.len(),
                MAX_ENTRY_SIZE
            )));
        }
        let crc = Self::compute_crc(self.lsn, &payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a payload whose header has already been read and checked
    pub fn deserialize(lsn: u64, payload: &[u8]) -> Result<Self> {
        let entry: WalEntry = bincode::deserialize(payload)?;
        if entry.lsn != lsn {
            return Err(TallyError::WalCorruption(format!(
                "LSN mismatch: header says {}, payload says {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    /// CRC32 over the LSN and payload
    pub fn compute_crc(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}
