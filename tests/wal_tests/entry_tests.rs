//! Tests for WAL Entry framing
//!
//! These tests verify:
//! - Frame layout (little-endian header + bincode payload)
//! - Round-trip of single puts and batches
//! - LSN and CRC checks on the payload

use tallykv::wal::{Operation, WalEntry, HEADER_SIZE};
use tallykv::TallyError;

// =============================================================================
// Helper Functions
// =============================================================================

fn put(key: &[u8], value: &[u8]) -> Operation {
    Operation::Put {
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

/// Split a frame into (lsn, crc, len, payload)
fn split_frame(frame: &[u8]) -> (u64, u32, u32, &[u8]) {
    let lsn = u64::from_le_bytes(frame[0..8].try_into().unwrap());
    let crc = u32::from_le_bytes(frame[8..12].try_into().unwrap());
    let len = u32::from_le_bytes(frame[12..16].try_into().unwrap());
    (lsn, crc, len, &frame[HEADER_SIZE..])
}

// =============================================================================
// Frame Layout Tests
// =============================================================================

#[test]
fn test_frame_header_is_little_endian() {
    let entry = WalEntry::new(0x0102_0304, put(b"k", b"v"));
    let frame = entry.serialize().unwrap();

    assert_eq!(&frame[0..8], &0x0102_0304u64.to_le_bytes());

    let (lsn, crc, len, payload) = split_frame(&frame);
    assert_eq!(lsn, 0x0102_0304);
    assert_eq!(len as usize, payload.len());
    assert_eq!(crc, WalEntry::compute_crc(lsn, payload));
}

#[test]
fn test_round_trip_put() {
    let entry = WalEntry::new(1, put(b"hello", b"world"));
    let frame = entry.serialize().unwrap();

    let (lsn, _, _, payload) = split_frame(&frame);
    let recovered = WalEntry::deserialize(lsn, payload).unwrap();

    assert_eq!(recovered, entry);
}

#[test]
fn test_round_trip_batch() {
    let entry = WalEntry::new(
        7,
        Operation::Batch {
            entries: vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"a".to_vec(), b"3".to_vec()),
            ],
        },
    );
    let frame = entry.serialize().unwrap();
    let (lsn, _, _, payload) = split_frame(&frame);

    assert_eq!(WalEntry::deserialize(lsn, payload).unwrap(), entry);
}

#[test]
fn test_round_trip_empty_key_and_value() {
    let entry = WalEntry::new(100, put(b"", b""));
    let frame = entry.serialize().unwrap();
    let (lsn, _, _, payload) = split_frame(&frame);

    assert_eq!(WalEntry::deserialize(lsn, payload).unwrap(), entry);
}

#[test]
fn test_large_value() {
    let large_value = vec![0xAB; 1024 * 1024]; // 1 MB value
    let entry = WalEntry::new(999, put(b"big_key", &large_value));
    let frame = entry.serialize().unwrap();
    let (lsn, _, _, payload) = split_frame(&frame);

    match WalEntry::deserialize(lsn, payload).unwrap().operation {
        Operation::Put { key, value } => {
            assert_eq!(key, b"big_key");
            assert_eq!(value, large_value);
        }
        other => panic!("Expected Put operation, got {:?}", other),
    }
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_crc_changes_with_payload() {
    let entry = WalEntry::new(1, put(b"key", b"value"));
    let frame = entry.serialize().unwrap();
    let (lsn, crc, _, payload) = split_frame(&frame);

    let mut damaged = payload.to_vec();
    if let Some(byte) = damaged.last_mut() {
        *byte ^= 0xFF;
    }

    assert_ne!(WalEntry::compute_crc(lsn, &damaged), crc);
}

#[test]
fn test_crc_covers_lsn() {
    let payload = b"same payload";
    assert_ne!(
        WalEntry::compute_crc(1, payload),
        WalEntry::compute_crc(2, payload)
    );
}

#[test]
fn test_lsn_mismatch_is_corruption() {
    let entry = WalEntry::new(5, put(b"key", b"value"));
    let frame = entry.serialize().unwrap();
    let (_, _, _, payload) = split_frame(&frame);

    let result = WalEntry::deserialize(6, payload);
    assert!(matches!(result, Err(TallyError::WalCorruption(_))));
}

#[test]
fn test_truncated_payload_fails() {
    let entry = WalEntry::new(1, put(b"key", b"value"));
    let frame = entry.serialize().unwrap();
    let (lsn, _, _, payload) = split_frame(&frame);

    let result = WalEntry::deserialize(lsn, &payload[..payload.len() / 2]);
    assert!(result.is_err());
}

// =============================================================================
// Operation Tests
// =============================================================================

#[test]
fn test_into_pairs() {
    assert_eq!(
        put(b"k", b"v").into_pairs(),
        vec![(b"k".to_vec(), b"v".to_vec())]
    );

    let batch = Operation::Batch {
        entries: vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())],
    };
    assert_eq!(batch.into_pairs().len(), 2);
}

#[test]
fn test_lsn_preserved() {
    for lsn in [0, 1, u64::MAX, 12345678901234] {
        let frame = WalEntry::new(lsn, put(b"key", b"v")).serialize().unwrap();
        let (header_lsn, _, _, payload) = split_frame(&frame);

        assert_eq!(header_lsn, lsn);
        assert_eq!(WalEntry::deserialize(lsn, payload).unwrap().lsn, lsn);
    }
}
