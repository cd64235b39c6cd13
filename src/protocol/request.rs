//! Request definitions
//!
//! A request body is a JSON object whose `action` field picks the operation.
//! Which actions exist, and what `insert` carries, depends on whether the
//! server stores transactions or logs.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, TallyError};
use crate::record::{Log, Transaction};

/// Request understood by a transaction server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransactionRequest {
    Insert(Transaction),
    BatchInsert {
        transactions: Vec<Transaction>,
    },
    /// Seconds since the Unix epoch, both ends inclusive
    Query {
        start_timestamp: i64,
        end_timestamp: i64,
    },
    QueryById {
        id: String,
    },
}

/// Request understood by a log server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LogRequest {
    Insert(LogInput),
    BatchInsert {
        logs: Vec<LogInput>,
    },
    /// Milliseconds since the Unix epoch, both ends inclusive
    Query {
        start_timestamp: i64,
        end_timestamp: i64,
    },
    QueryByReference {
        reference: String,
    },
    QueryAll,
}

/// A log as clients send it; `timestamp` may be left out
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogInput {
    pub reference: String,
    pub metadata: Value,
    #[serde(default)]
    pub timestamp: i64,
}

impl From<LogInput> for Log {
    fn from(input: LogInput) -> Self {
        Log::with_timestamp(input.reference, input.metadata, input.timestamp)
    }
}

impl TransactionRequest {
    pub fn parse(body: &[u8]) -> Result<Self> {
        parse(body)
    }
}

impl LogRequest {
    pub fn parse(body: &[u8]) -> Result<Self> {
        parse(body)
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TallyError::Protocol(format!("invalid request: {}", e)))
}
