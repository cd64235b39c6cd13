//! Key Layout Tests

use tallykv::keys::{day_of_key, range_key, transaction_index_key, transaction_key};

#[test]
fn test_range_key_formats_day_in_utc() {
    // 2023-11-14T22:13:20Z
    assert_eq!(range_key(1_700_000_000), "2023-11-14");
    // One second before midnight, then midnight
    assert_eq!(range_key(1_700_006_399), "2023-11-14");
    assert_eq!(range_key(1_700_006_400), "2023-11-15");
}

#[test]
fn test_range_key_clamps_out_of_range_timestamps() {
    assert_eq!(range_key(-5), "1970-01-01");
    assert_eq!(range_key(i64::MAX), "9999-12-31");
}

#[test]
fn test_transaction_keys_order_by_day_then_id() {
    let a = transaction_key(1_700_000_000, "TX9");
    let b = transaction_key(1_700_006_400, "TX1");

    assert_eq!(a, "2023-11-14:TX9");
    assert!(a < b);
}

#[test]
fn test_index_keys_sort_before_day_keys() {
    let index = transaction_index_key("ZZZ");
    assert!(index.as_str() < range_key(0).as_str());
}

#[test]
fn test_day_extracted_only_from_primary_keys() {
    assert_eq!(day_of_key(b"2023-11-14:TX1"), Some("2023-11-14"));
    assert_eq!(day_of_key(b"#id:TX1"), None);
    assert_eq!(day_of_key(b"2023-11-14"), None);
    assert_eq!(day_of_key(b"2023x11-14:TX1"), None);
}
