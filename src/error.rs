use crate::types::FragmentId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tag tool {command} failed with {status}")]
    TagTool { command: String, status: String },

    #[error("Tag tool {command} did not finish within {secs}s")]
    ToolTimeout { command: String, secs: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Fragment {0} is read-only")]
    ReadOnlyFragment(FragmentId),

    #[error("Fragment {0} is not registered with the indexer")]
    UnknownFragment(FragmentId),

    #[error("Indexer worker for {0} stopped")]
    WorkerStopped(FragmentId),

    #[error("Not implemented for composite bindings: {0}")]
    CompositionUnsupported(&'static str),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl IndexError {
    /// Whether this is the "not implemented for composite" signal that
    /// callers branch on.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::CompositionUnsupported(_))
    }
}

impl From<notify::Error> for IndexError {
    fn from(err: notify::Error) -> Self {
        IndexError::Watcher(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
