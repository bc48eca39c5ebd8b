use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Can't open db [{path}]: {reason}")]
    StorageOpen { path: PathBuf, reason: String },

    #[error("Database {0} is locked by another write pass")]
    StorageLocked(PathBuf),

    #[error("Database {0} is open read-only")]
    ReadOnly(PathBuf),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Corrupt record under key {key:?}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Indexing pass was cancelled")]
    Cancelled,

    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<toml::de::Error> for IndexerError {
    fn from(err: toml::de::Error) -> Self {
        IndexerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

/// The front end could not produce an AST for a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unable to parse unit for {}: {reason}", file.display())]
pub struct ParseError {
    pub file: PathBuf,
    pub reason: String,
}

impl ParseError {
    pub fn new(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// A member-function declaration whose out-of-line definition entry was never recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no definition entry at {expected} for declaration {declaration}")]
pub struct ConsistencyError {
    pub declaration: String,
    pub expected: String,
}
