//! Response definitions
//!
//! Every response body is a JSON object with `success` and `message`, plus
//! at most one payload field.

use serde::{Deserialize, Serialize};

use crate::error::TallyError;
use crate::record::{Log, Transaction};

/// Response status codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Ok,
    BadRequest,
    NotFound,
    Conflict,
    InternalError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Conflict => 409,
            Status::InternalError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::Conflict => "Conflict",
            Status::InternalError => "Internal Server Error",
        }
    }

    /// Status that reports `error` to a client
    pub fn for_error(error: &TallyError) -> Self {
        match error {
            TallyError::DuplicateKey(_) => Status::Conflict,
            TallyError::NotFound(_) => Status::NotFound,
            TallyError::Protocol(_) | TallyError::InvalidRecord(_) | TallyError::Config(_) => {
                Status::BadRequest
            }
            // Requests fail as Protocol errors; Decode only comes from stored bytes
            TallyError::Io(_)
            | TallyError::WalCorruption(_)
            | TallyError::Storage(_)
            | TallyError::Serialization(_)
            | TallyError::Decode(_) => Status::InternalError,
        }
    }
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip)]
    pub status: Status,

    pub success: bool,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Log>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Log>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Response {
    /// Successful response with only a message
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            success: true,
            message: message.into(),
            transaction: None,
            transactions: None,
            log: None,
            logs: None,
            count: None,
        }
    }

    /// Failed response reporting `error`
    pub fn error(error: &TallyError) -> Self {
        Self {
            status: Status::for_error(error),
            success: false,
            ..Self::ok(error.to_string())
        }
    }

    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transaction = Some(tx);
        self
    }

    pub fn with_transactions(mut self, txs: Vec<Transaction>) -> Self {
        self.transactions = Some(txs);
        self
    }

    pub fn with_log(mut self, log: Log) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_logs(mut self, logs: Vec<Log>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// JSON body
    pub fn to_json(&self) -> Vec<u8> {
        // Only strings, integers and JSON values; serialization cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}
