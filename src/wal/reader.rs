//! WAL Reader
//!
//! Handles reading frames from a WAL segment.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;

use super::{WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};

/// One frame as found on disk
#[derive(Debug)]
pub enum Frame {
    /// A well-formed entry
    Entry(WalEntry),

    /// A complete frame whose checksum or payload did not verify
    Corrupted { lsn: u64, len: u32 },

    /// The file ends in the middle of a frame (partial write)
    TornTail,
}

/// Reads frames from a WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last complete frame
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next frame, `None` at a clean end of file
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(Some(Frame::TornTail));
        }

        let mut header = [0u8; HEADER_SIZE];
        if !self.read_fully(&mut header)? {
            return Ok(Some(Frame::TornTail));
        }

        let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default());
        let len = u32::from_le_bytes(header[12..16].try_into().unwrap_or_default());

        if len > MAX_ENTRY_SIZE || (len as u64) > remaining - HEADER_SIZE as u64 {
            return Ok(Some(Frame::TornTail));
        }

        let mut payload = vec![0u8; len as usize];
        if !self.read_fully(&mut payload)? {
            return Ok(Some(Frame::TornTail));
        }
        self.position += (HEADER_SIZE + payload.len()) as u64;

        if WalEntry::compute_crc(lsn, &payload) != crc {
            return Ok(Some(Frame::Corrupted { lsn, len }));
        }

        match WalEntry::deserialize(lsn, &payload) {
            Ok(entry) => Ok(Some(Frame::Entry(entry))),
            Err(_) => Ok(Some(Frame::Corrupted { lsn, len })),
        }
    }

    /// Read every valid entry, skipping damaged ones
    pub fn entries(mut self) -> Result<Vec<WalEntry>> {
        let mut entries = Vec::new();
        while let Some(frame) = self.next_frame()? {
            match frame {
                Frame::Entry(entry) => entries.push(entry),
                Frame::Corrupted { .. } => continue,
                Frame::TornTail => break,
            }
        }
        Ok(entries)
    }

    /// Offset just past the last complete frame
    pub fn position(&self) -> u64 {
        self.position
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.reader.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
