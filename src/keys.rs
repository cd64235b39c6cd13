//! Key scheme
//!
//! How records map onto ordered storage keys.
//!
//! ```text
//! #id:TX1                  → "2023-11-14:TX1"   (transaction id index)
//! 2023-11-14:TX1           → transaction bytes  (day, then id)
//! 2023-11-15:TX0           → transaction bytes
//! ```
//!
//! Days are calendar days in UTC, on both the write and the query path.
//! `#` sorts before every digit, so the id index occupies its own region in
//! front of the day-prefixed keys and never shows up in a forward scan that
//! starts at a day.
//!
//! Logs are keyed by their bare `reference` in a store of their own.

use time::OffsetDateTime;

/// Separator between the day prefix and the transaction id
pub const DAY_SEPARATOR: char = ':';

/// Prefix of transaction id-index entries
pub const ID_INDEX_PREFIX: &str = "#id:";

/// Length of a `YYYY-MM-DD` day key
pub const DAY_KEY_LEN: usize = 10;

/// Latest instant with a four-digit year (9999-12-31T23:59:59Z)
const MAX_TIMESTAMP: i64 = 253_402_300_799;

/// Calendar day (UTC) of a timestamp in seconds, as `YYYY-MM-DD`
///
/// Timestamps outside 1970-01-01 ..= 9999-12-31 are clamped into that range
/// so every key keeps the same width.
pub fn range_key(timestamp: i64) -> String {
    let clamped = timestamp.clamp(0, MAX_TIMESTAMP);
    let date = OffsetDateTime::from_unix_timestamp(clamped)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Primary key of a transaction: `range_key(timestamp) + ":" + id`
pub fn transaction_key(timestamp: i64, id: &str) -> String {
    let mut key = range_key(timestamp);
    key.push(DAY_SEPARATOR);
    key.push_str(id);
    key
}

/// Id-index key of a transaction: `"#id:" + id`
pub fn transaction_index_key(id: &str) -> String {
    format!("{}{}", ID_INDEX_PREFIX, id)
}

/// Primary key of a log: its reference
pub fn log_key(reference: &str) -> &[u8] {
    reference.as_bytes()
}

/// Day prefix of a transaction primary key, `None` for any other key
pub fn day_of_key(key: &[u8]) -> Option<&str> {
    if key.len() <= DAY_KEY_LEN || key[DAY_KEY_LEN] != DAY_SEPARATOR as u8 {
        return None;
    }
    let day = std::str::from_utf8(&key[..DAY_KEY_LEN]).ok()?;
    let shape_ok = day.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 => b == b'-',
        _ => b.is_ascii_digit(),
    });
    shape_ok.then_some(day)
}
