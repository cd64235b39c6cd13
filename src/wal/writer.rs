//! WAL Writer
//!
//! Handles appending entries to a WAL segment.
//!
//! A failed append never leaves bytes behind: the segment is cut back to its
//! length before the append, so a later frame can't end up stranded behind
//! garbage (where recovery would treat it as a torn tail). If the cut itself
//! fails, the writer refuses further appends.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, TallyError};

use super::{Operation, WalEntry, WalRecovery};

/// The file operations a WAL segment needs
pub trait SegmentFile: Write {
    fn set_len(&self, len: u64) -> io::Result<()>;
    fn sync_data(&self) -> io::Result<()>;
}

impl SegmentFile for File {
    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes entries to a WAL file
pub struct WalWriter<F: SegmentFile = File> {
    path: PathBuf,
    file: F,
    /// Bytes of complete frames in the segment
    len: u64,
    /// LSN of the last appended entry (0 = none yet)
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    unsynced: usize,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl WalWriter<File> {
    /// Open or create a WAL file
    ///
    /// Appending continues after the last valid LSN already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let current_lsn = if path.exists() && path.metadata()?.len() > 0 {
            WalRecovery::recover(path)?.1.last_lsn
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self::with_file(path, file, current_lsn, len, sync_strategy))
    }
}

impl<F: SegmentFile> WalWriter<F> {
    /// Wrap an open append-mode segment holding `len` bytes of valid frames
    /// up to `last_lsn`
    pub fn with_file(
        path: &Path,
        file: F,
        last_lsn: u64,
        len: u64,
        sync_strategy: WalSyncStrategy,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            len,
            current_lsn: last_lsn,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        }
    }

    /// Append an operation to the WAL, returning its LSN
    ///
    /// On error the segment is left exactly as it was before the call.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        if self.poisoned {
            return Err(TallyError::Storage(format!(
                "WAL segment {} is unusable after a failed write",
                self.path.display()
            )));
        }

        let lsn = self.current_lsn + 1;
        let frame = WalEntry::new(lsn, operation).serialize()?;

        let sync_now = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };

        let written = self.file.write_all(&frame).and_then(|()| {
            if sync_now {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            self.roll_back();
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        self.current_lsn = lsn;
        self.unsynced = if sync_now { 0 } else { self.unsynced + 1 };

        Ok(lsn)
    }

    fn roll_back(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "could not remove a partial WAL frame"
            );
            self.poisoned = true;
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Path of this segment
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether appends are refused after an unrecoverable failure
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}
