use crate::storage::{DurableValue, Index, Log, LogEntries, LogEntry, PersistenceError, Persist, Term};
use prost::Message;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// FileValue keeps one value per file, in its `Persist` text form.
pub struct FileValue<V> {
    path: PathBuf,
    value: V,
}

impl<V: Default> FileValue<V> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileValue {
            path: path.into(),
            value: V::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl<V> DurableValue<V> for FileValue<V>
where
    V: Persist + Send + Sync + 'static,
{
    async fn read(&mut self) -> Result<(), PersistenceError> {
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        self.value = V::from_text(&text).map_err(|reason| PersistenceError::corrupt(&self.path, reason))?;
        Ok(())
    }

    async fn write(&mut self) -> Result<(), PersistenceError> {
        write_atomically(&self.path, self.value.to_text().as_bytes()).await
    }

    async fn exists(&self) -> Result<bool, PersistenceError> {
        file_exists(&self.path).await
    }

    fn value(&self) -> &V {
        &self.value
    }

    fn set_value(&mut self, value: V) {
        self.value = value;
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct ProtoLogEntry {
    #[prost(uint64, tag = "1")]
    index: u64,
    #[prost(uint64, tag = "2")]
    term: u64,
    #[prost(bytes, tag = "3")]
    command: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct ProtoLogFile {
    #[prost(message, repeated, tag = "1")]
    entries: Vec<ProtoLogEntry>,
}

/// FileLog stores every entry after the sentinel in one prost-encoded file.
pub struct FileLog {
    path: PathBuf,
    entries: LogEntries,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLog {
            path: path.into(),
            entries: LogEntries::new(),
        }
    }
}

#[async_trait::async_trait]
impl Log for FileLog {
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
        if !file_exists(&self.path).await? {
            self.entries = LogEntries::new();
            return Ok(());
        }

        let bytes = fs::read(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        let file = ProtoLogFile::decode(&bytes[..])
            .map_err(|e| PersistenceError::corrupt(&self.path, e.to_string()))?;
        let stored = file
            .entries
            .into_iter()
            .map(|e| LogEntry::new(Index::new(e.index), Term::new(e.term), e.command.into()))
            .collect();
        self.entries = LogEntries::load(stored)?;

        Ok(())
    }

    async fn write(&mut self) -> Result<(), PersistenceError> {
        let file = ProtoLogFile {
            entries: self
                .entries
                .stored()
                .iter()
                .map(|e| ProtoLogEntry {
                    index: e.index.as_u64(),
                    term: e.term.as_u64(),
                    command: e.command.to_vec(),
                })
                .collect(),
        };

        let mut buf = Vec::with_capacity(file.encoded_len());
        file.encode(&mut buf)
            .map_err(|e| PersistenceError::corrupt(&self.path, e.to_string()))?;
        write_atomically(&self.path, &buf).await
    }
}

async fn file_exists(path: &Path) -> Result<bool, PersistenceError> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

// Readers only ever see the old or the new contents, never a torn write.
async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)
        .await
        .map_err(|e| PersistenceError::io(&tmp_path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| PersistenceError::io(&tmp_path, e))?;
    file.sync_all().await.map_err(|e| PersistenceError::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PersistenceError::io(path, e))
}
