//! Error types for the causeway synchronization engine.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Manifest loading and validation errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Logical prefix {0:?} is mapped more than once")]
    DuplicatePrefix(String),

    #[error("Directory {0:?} is mapped by more than one logical prefix")]
    DuplicateDirectory(String),
}

/// Push-session protocol errors
///
/// Each variant is a recoverable protocol outcome, translated into a response
/// at the request boundary rather than crashing the serving process.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("The push session does not exist: {0}")]
    NotFound(String),

    #[error("Script path has no stored hash: {0}")]
    NotExpected(String),

    #[error("Script hashes do not match ({expected} != {actual})")]
    HashMismatch { expected: String, actual: String },

    #[error("At least one script source was not sent when its hash was given")]
    Incomplete,
}

/// Top-level errors surfaced by the engine facade
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No filesystem mapping for script path: {0}")]
    MappingNotFound(String),

    #[error("File with script path {0:?} does not exist")]
    FileNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
