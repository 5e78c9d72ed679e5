use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not a recognized bundle: {0:?}")]
    Format(PathBuf),
    #[error("iterator is not positioned on an entry")]
    IteratorState,
    #[error("content of {0:?} was already consumed")]
    AlreadyConsumed(String),
    #[error("unsupported entry type: {0:?}")]
    UnsupportedEntry(String),
    #[error("input/output error: {0}")]
    Io(#[from] std::io::Error),
    #[error("entry {0:?} not found")]
    EntryNotFound(String),
}

impl From<std::io::ErrorKind> for Error {
    fn from(other: std::io::ErrorKind) -> Self {
        Self::Io(other.into())
    }
}

/// Why a link chain could not be followed to a non-link entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("link cycle through {0:?}")]
    Cycle(String),
    #[error("dangling link {0:?} -> {1:?}")]
    Dangling(String, String),
    #[error("link {0:?} points outside of the payload")]
    OutsideRoot(String),
    #[error("link {0:?} resolves to {1:?} which is not a regular file")]
    NotRegular(String, String),
}
