//! Audit log record
//!
//! Stored as a JSON object with exactly `reference`, `metadata` and
//! `timestamp`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TallyError};

use super::Codec;

/// An audit log entry
///
/// `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Log {
    reference: String,
    metadata: Value,
    timestamp: i64,
}

impl Log {
    /// Create a log stamped with the current time
    pub fn new(reference: impl Into<String>, metadata: Value) -> Self {
        Self::with_timestamp(reference, metadata, 0)
    }

    /// Create a log with an explicit timestamp; `0` means "now"
    pub fn with_timestamp(reference: impl Into<String>, metadata: Value, timestamp: i64) -> Self {
        let timestamp = if timestamp == 0 { now_millis() } else { timestamp };
        Self {
            reference: reference.into(),
            metadata,
            timestamp,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn validate(&self) -> Result<()> {
        if self.reference.is_empty() {
            return Err(TallyError::InvalidRecord(
                "log reference must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Codec for Log {
    fn encode(&self) -> Vec<u8> {
        // A struct of a string, a Value and an i64 always serializes
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| TallyError::Decode(format!("log: {}", e)))
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
