use crate::storage::{Index, PersistenceError, Term};
use bytes::Bytes;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub index: Index,
    pub term: Term,
    pub command: Bytes,
}

impl LogEntry {
    pub fn new(index: Index, term: Term, command: Bytes) -> Self {
        LogEntry { index, term, command }
    }

    fn sentinel() -> Self {
        LogEntry::new(Index::SENTINEL, Term::default(), Bytes::new())
    }
}

/// Log is the append-only list of entries. Every log starts with the sentinel entry at index 0,
/// so `last_entry()` always exists. `append()` is in memory only, `write()` makes it durable.
#[async_trait::async_trait]
pub trait Log: Send + Sync {
    fn append(&mut self, entry: LogEntry) -> Result<(), PersistenceError>;

    fn entry(&self, index: Index) -> Option<&LogEntry>;

    fn last_entry(&self) -> &LogEntry;

    fn last_index(&self) -> Index {
        self.last_entry().index
    }

    fn last_term(&self) -> Term {
        self.last_entry().term
    }

    /// `None` once indices are used up.
    fn next_index(&self) -> Option<Index> {
        self.last_index().next()
    }

    /// Loads the stored entries. A log that was never written holds just the sentinel.
    async fn read(&mut self) -> Result<(), PersistenceError>;

    async fn write(&mut self) -> Result<(), PersistenceError>;
}

/// In-memory entry list shared by the log implementations.
#[derive(Clone, Debug)]
pub(crate) struct LogEntries {
    entries: Vec<LogEntry>,
}

impl LogEntries {
    pub(crate) fn new() -> Self {
        LogEntries {
            entries: vec![LogEntry::sentinel()],
        }
    }

    pub(crate) fn append(&mut self, entry: LogEntry) -> Result<(), PersistenceError> {
        let expected = self.last().index.next().ok_or(PersistenceError::LogFull)?;
        if entry.index != expected {
            return Err(PersistenceError::NonContiguousAppend {
                expected,
                actual: entry.index,
            });
        }

        self.entries.push(entry);
        Ok(())
    }

    pub(crate) fn get(&self, index: Index) -> Option<&LogEntry> {
        self.entries.get(index.as_u64() as usize)
    }

    pub(crate) fn last(&self) -> &LogEntry {
        // Never empty, the sentinel is never removed.
        &self.entries[self.entries.len() - 1]
    }

    /// Entries after the sentinel, which is what goes to storage.
    pub(crate) fn stored(&self) -> &[LogEntry] {
        &self.entries[1..]
    }

    pub(crate) fn load(stored: Vec<LogEntry>) -> Result<Self, PersistenceError> {
        let mut entries = LogEntries::new();
        for entry in stored {
            entries.append(entry)?;
        }

        Ok(entries)
    }
}
