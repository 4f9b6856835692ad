use crate::storage::{DurableValue, Index, Log, LogEntries, LogEntry, PersistenceError};
use std::sync::{Arc, Mutex};

/// MemoryDisk is the "stable storage" behind the memory implementations. Clones share the same
/// slot, so a test can keep one clone and observe what the server flushed and when.
pub struct MemoryDisk<V> {
    slot: Arc<Mutex<DiskSlot<V>>>,
}

struct DiskSlot<V> {
    stored: Option<V>,
    write_count: usize,
    fail_writes: bool,
}

impl<V> Clone for MemoryDisk<V> {
    fn clone(&self) -> Self {
        MemoryDisk {
            slot: self.slot.clone(),
        }
    }
}

impl<V: Clone> MemoryDisk<V> {
    pub fn new() -> Self {
        Self::with_slot(None)
    }

    /// A disk that already holds `value`, as if written by a previous run.
    pub fn with_value(value: V) -> Self {
        Self::with_slot(Some(value))
    }

    fn with_slot(stored: Option<V>) -> Self {
        MemoryDisk {
            slot: Arc::new(Mutex::new(DiskSlot {
                stored,
                write_count: 0,
                fail_writes: false,
            })),
        }
    }

    pub fn stored(&self) -> Option<V> {
        self.lock().stored.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    /// While set, every write fails with `PersistenceError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn store(&self, name: &str, value: V) -> Result<(), PersistenceError> {
        let mut slot = self.lock();
        if slot.fail_writes {
            return Err(PersistenceError::Unavailable(name.to_string()));
        }
        slot.stored = Some(value);
        slot.write_count += 1;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DiskSlot<V>> {
        // The slot is never left half-updated, so a poisoned lock is still usable.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone> Default for MemoryDisk<V> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryValue<V> {
    name: String,
    value: V,
    disk: MemoryDisk<V>,
}

impl<V: Clone + Default> MemoryValue<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_disk(name, MemoryDisk::new())
    }

    pub fn with_disk(name: impl Into<String>, disk: MemoryDisk<V>) -> Self {
        MemoryValue {
            name: name.into(),
            value: V::default(),
            disk,
        }
    }

    pub fn disk(&self) -> &MemoryDisk<V> {
        &self.disk
    }
}

#[async_trait::async_trait]
impl<V> DurableValue<V> for MemoryValue<V>
where
    V: Clone + Default + Send + Sync + 'static,
{
    async fn read(&mut self) -> Result<(), PersistenceError> {
        let stored = self.disk.stored().ok_or_else(|| PersistenceError::Missing(self.name.clone()))?;
        self.value = stored;
        Ok(())
    }

    async fn write(&mut self) -> Result<(), PersistenceError> {
        self.disk.store(&self.name, self.value.clone())
    }

    async fn exists(&self) -> Result<bool, PersistenceError> {
        Ok(self.disk.stored().is_some())
    }

    fn value(&self) -> &V {
        &self.value
    }

    fn set_value(&mut self, value: V) {
        self.value = value;
    }
}

pub struct MemoryLog {
    entries: LogEntries,
    disk: MemoryDisk<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_disk(MemoryDisk::new())
    }

    pub fn with_disk(disk: MemoryDisk<Vec<LogEntry>>) -> Self {
        MemoryLog {
            entries: LogEntries::new(),
            disk,
        }
    }

    pub fn disk(&self) -> &MemoryDisk<Vec<LogEntry>> {
        &self.disk
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Log for MemoryLog {
    fn append(&mut self, entry: LogEntry) -> Result<(), PersistenceError> {
        self.entries.append(entry)
    }

    fn entry(&self, index: Index) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    fn last_entry(&self) -> &LogEntry {
        self.entries.last()
    }

    async fn read(&mut self) -> Result<(), PersistenceError> {
        self.entries = LogEntries::load(self.disk.stored().unwrap_or_default())?;
        Ok(())
    }

    async fn write(&mut self) -> Result<(), PersistenceError> {
        self.disk.store("log", self.entries.stored().to_vec())
    }
}
