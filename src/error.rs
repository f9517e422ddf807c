//! Centralized error types for nsx2md.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the nsx2md library.
#[derive(Error, Debug)]
pub enum NsxError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified archive does not exist.
    #[error("Archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// The file could not be opened as a ZIP container.
    #[error("File does not appear to be a valid NSX archive '{path}': {reason}")]
    InvalidArchive { path: PathBuf, reason: String },

    /// The archive has no `config.json` index entry.
    #[error("Archive '{0}' has no config.json index")]
    MissingIndex(PathBuf),

    /// The index exists but lacks a required key or is not valid JSON.
    #[error("Malformed index in '{path}': {reason}")]
    MalformedIndex { path: PathBuf, reason: String },

    /// A named entry is not present in the archive.
    #[error("Entry '{0}' not found in archive")]
    MissingEntry(String),

    /// An entry exists but could not be read from the container.
    #[error("Failed to read entry '{entry}': {reason}")]
    EntryRead { entry: String, reason: String },

    /// An entry's JSON payload could not be decoded.
    #[error("Failed to decode entry '{entry}': {source}")]
    Json {
        entry: String,
        source: serde_json::Error,
    },

    /// The note is encrypted and cannot be converted.
    #[error("Note '{0}' is locked")]
    LockedNote(String),

    /// The note's notebook could not be resolved, not even to the recycle bin.
    #[error("No notebook available for note '{0}'")]
    UnresolvedNotebook(String),

    /// The external converter binary could not be located.
    #[error(
        "Can't find pandoc. Please install pandoc or place it in the directory where nsx2md is run"
    )]
    ConverterNotFound,

    /// The external converter did not finish within the allotted time.
    #[error("pandoc did not finish within {seconds}s")]
    ConverterTimeout { seconds: u64 },

    /// The external converter exited unsuccessfully.
    #[error("pandoc failed ({status}): {stderr}")]
    ConverterFailed { status: String, stderr: String },

    /// No archives were given and none were found by scanning.
    #[error("No .nsx archives found in {0}")]
    NoArchives(PathBuf),
}

/// Convenience alias for `Result<T, NsxError>`.
pub type Result<T> = std::result::Result<T, NsxError>;

impl NsxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
