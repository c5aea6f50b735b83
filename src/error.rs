//! Error types for building, decoding and serving archives.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures while building an archive or decoding its index and trailer.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("input directory does not exist or is not a directory: {}", .0.display())]
    InputDirMissing(PathBuf),

    #[error("cannot write archive {}: {source}", .path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path is {len} bytes, longer than the 65535 the index can hold: {path}")]
    PathTooLong { path: String, len: usize },

    #[error("file name is not valid utf-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("malformed archive: {0}")]
    Decode(String),

    #[error("walking input directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Request-level failures of the archive server.
///
/// Every variant maps onto an HTTP status through [`ServeError::status`].
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("configuration key {0} is not set")]
    ConfigMissing(String),

    #[error("blob {0} not found")]
    BlobNotFound(String),

    #[error("malformed archive: {0}")]
    Decode(String),

    #[error("decompressing entry {path}: {source}")]
    Decompression {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no entry for {0}")]
    PathNotFound(String),

    #[error("store: {0:#}")]
    Store(anyhow::Error),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::PathNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ArchiveError> for ServeError {
    fn from(value: ArchiveError) -> Self {
        match value {
            ArchiveError::Decode(msg) => ServeError::Decode(msg),
            other => ServeError::Decode(other.to_string()),
        }
    }
}

pub type ServeResult<T> = Result<T, ServeError>;
