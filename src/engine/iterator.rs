//! Engine iterator
//!
//! Merges memtable snapshots and SSTables into one forward cursor. Sources
//! are kept in priority order (active memtable, frozen memtables newest
//! first, then SSTables newest first); when several sources hold the same
//! key, the first one wins.

use bytes::Bytes;

use crate::error::{Result, TallyError};
use crate::memtable::Snapshot;
use crate::storage::SSTableIterator;

/// Cursor over one memtable snapshot
pub(crate) struct MemCursor {
    snapshot: Snapshot,
    current: Option<(Vec<u8>, Bytes)>,
}

impl MemCursor {
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            current: None,
        }
    }

    fn seek(&mut self, key: &[u8]) {
        self.current = self.snapshot.seek(key).map(|(k, v)| (k, Bytes::from(v)));
    }

    fn advance(&mut self) {
        if let Some((current, _)) = self.current.take() {
            self.current = self
                .snapshot
                .next_after(&current)
                .map(|(k, v)| (k, Bytes::from(v)));
        }
    }

    fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Result<Bytes> {
        self.current
            .as_ref()
            .map(|(_, v)| v.clone())
            .ok_or_else(|| TallyError::Storage("memtable cursor is not positioned".to_string()))
    }
}

pub(crate) enum Source {
    Mem(MemCursor),
    Table(SSTableIterator),
}

impl Source {
    fn seek(&mut self, key: &[u8]) {
        match self {
            Source::Mem(c) => c.seek(key),
            Source::Table(t) => t.seek(key),
        }
    }

    fn advance(&mut self) {
        match self {
            Source::Mem(c) => c.advance(),
            Source::Table(t) => t.advance(),
        }
    }

    fn key(&self) -> Option<&[u8]> {
        match self {
            Source::Mem(c) => c.key(),
            Source::Table(t) => t.key(),
        }
    }

    fn value(&self) -> Result<Bytes> {
        match self {
            Source::Mem(c) => c.value(),
            Source::Table(t) => t.value(),
        }
    }
}

/// Forward cursor over a point-in-time snapshot of the engine
///
/// Starts unpositioned; call [`seek`](Self::seek) or
/// [`seek_to_first`](Self::seek_to_first) before reading. Writes made after
/// the iterator was created are never observed.
pub struct EngineIterator {
    sources: Vec<Source>,
    current: Option<(Vec<u8>, Bytes)>,
}

impl EngineIterator {
    pub(crate) fn new(sources: Vec<Source>) -> Self {
        Self {
            sources,
            current: None,
        }
    }

    /// Position at the first key >= `key`, or past the end if there is none
    pub fn seek(&mut self, key: &[u8]) -> Result<()> {
        for source in &mut self.sources {
            source.seek(key);
        }
        self.settle()
    }

    /// Position at the smallest key
    pub fn seek_to_first(&mut self) -> Result<()> {
        self.seek(&[])
    }

    /// Move to the next key
    pub fn next(&mut self) -> Result<()> {
        let Some((current, _)) = self.current.take() else {
            return Ok(());
        };
        for source in &mut self.sources {
            if source.key() == Some(current.as_slice()) {
                source.advance();
            }
        }
        self.settle()
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Current key, `None` when the iterator is not valid
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(key, _)| key.as_slice())
    }

    /// Current value, `None` when the iterator is not valid
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, value)| value.as_ref())
    }

    /// Current key and value together
    pub fn entry(&self) -> Option<(&[u8], &[u8])> {
        self.current
            .as_ref()
            .map(|(key, value)| (key.as_slice(), value.as_ref()))
    }

    /// Pick the smallest key across sources; the highest-priority source
    /// holding it supplies the value
    fn settle(&mut self) -> Result<()> {
        let mut winner: Option<usize> = None;
        for (i, source) in self.sources.iter().enumerate() {
            let Some(key) = source.key() else { continue };
            match winner.and_then(|w| self.sources[w].key()) {
                Some(best) if key >= best => {}
                _ => winner = Some(i),
            }
        }

        self.current = None;
        if let Some(i) = winner {
            let source = &self.sources[i];
            let key = source.key().map(|k| k.to_vec()).unwrap_or_default();
            let value = source.value()?;
            self.current = Some((key, value));
        }
        Ok(())
    }
}
