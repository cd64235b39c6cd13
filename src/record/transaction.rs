//! Transaction record
//!
//! ## Stored Layout (little-endian)
//! ```text
//! ┌──────────┬─────┬──────────┬───────────┬──────────┬──────────┬────────────┬───────────────┐
//! │ IdLen(4) │ Id  │ RefLen(4)│ Reference │ CurLen(4)│ Currency │ Amount (8) │ Timestamp (8) │
//! └──────────┴─────┴──────────┴───────────┴──────────┴──────────┴────────────┴───────────────┘
//! ```

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

use super::Codec;

/// A financial transaction
///
/// `amount` is in the smallest currency unit; `timestamp` is seconds since
/// the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    reference: String,
    currency: String,
    #[serde(rename = "amount_smallest_unit")]
    amount: i64,
    timestamp: i64,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        reference: impl Into<String>,
        currency: impl Into<String>,
        amount: i64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            reference: reference.into(),
            currency: currency.into(),
            amount,
            timestamp,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Amount in the smallest currency unit
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Seconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Non-empty id, reference and currency, and a positive timestamp
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.reference.is_empty()
            && !self.currency.is_empty()
            && self.timestamp > 0
    }

    /// `Ok` for valid records, an `InvalidRecord` error naming the problem otherwise
    pub fn validate(&self) -> Result<()> {
        let problem = if self.id.is_empty() {
            "id must not be empty"
        } else if self.reference.is_empty() {
            "reference must not be empty"
        } else if self.currency.is_empty() {
            "currency must not be empty"
        } else if self.timestamp <= 0 {
            "timestamp must be positive"
        } else {
            return Ok(());
        };
        Err(TallyError::InvalidRecord(format!(
            "transaction {:?}: {}",
            self.id, problem
        )))
    }
}

impl Codec for Transaction {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            12 + self.id.len() + self.reference.len() + self.currency.len() + 16,
        );
        put_string(&mut buf, &self.id);
        put_string(&mut buf, &self.reference);
        put_string(&mut buf, &self.currency);
        buf.put_i64_le(self.amount);
        buf.put_i64_le(self.timestamp);
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;

        let id = get_string(&mut buf, "id")?;
        let reference = get_string(&mut buf, "reference")?;
        let currency = get_string(&mut buf, "currency")?;

        if buf.remaining() < 16 {
            return Err(TallyError::Decode(format!(
                "transaction: need 16 bytes for amount and timestamp, got {}",
                buf.remaining()
            )));
        }
        let amount = buf.get_i64_le();
        let timestamp = buf.get_i64_le();

        if buf.has_remaining() {
            return Err(TallyError::Decode(format!(
                "transaction: {} trailing bytes",
                buf.remaining()
            )));
        }

        Ok(Self {
            id,
            reference,
            currency,
            amount,
            timestamp,
        })
    }
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

fn get_string(buf: &mut &[u8], field: &str) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(TallyError::Decode(format!(
            "transaction: missing length prefix for {}",
            field
        )));
    }
    let len = buf.get_u32_le() as usize;
    if len > buf.remaining() {
        return Err(TallyError::Decode(format!(
            "transaction: {} claims {} bytes, only {} left",
            field,
            len,
            buf.remaining()
        )));
    }

    let (raw, rest) = buf.split_at(len);
    let value = std::str::from_utf8(raw)
        .map_err(|e| TallyError::Decode(format!("transaction: {} is not UTF-8: {}", field, e)))?
        .to_string();
    *buf = rest;
    Ok(value)
}
