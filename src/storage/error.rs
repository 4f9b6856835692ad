use crate::storage::Index;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt data in {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("Nothing has been persisted for {0}")]
    Missing(String),
    #[error("Storage {0} is unavailable")]
    Unavailable(String),
    #[error("Log append expected index {expected} but entry has index {actual}")]
    NonContiguousAppend { expected: Index, actual: Index },
    #[error("Log has no indices left")]
    LogFull,
}

impl PersistenceError {
    pub(super) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(super) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PersistenceError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
