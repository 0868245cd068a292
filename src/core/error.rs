//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for the `core` module.
///
/// These are the failures that stop a requested operation before it starts.
/// Problems with individual files never surface here: scans count them as
/// skipped and batch operations record them per file.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// Represents an error that occurred when a Tokio task was joined.
    /// This is often due to a task panicking or being cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The query configuration is inconsistent (e.g. min size above max size).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A scan was requested without any root folder.
    #[error("No search folders configured")]
    NoRoots,

    /// Represents a path that was expected to be a directory but was not.
    #[error("Path is not a valid directory: {0}")]
    NotADirectory(PathBuf),

    /// The copy target exists but cannot be written to.
    #[error("Target directory is not writable: {0}")]
    TargetNotWritable(PathBuf),

    /// A copy was requested before a target folder was chosen.
    #[error("No target folder selected")]
    NoTargetFolder,

    /// A scan or batch operation is already running in this session.
    #[error("Another operation is still running")]
    Busy,

    /// A batch operation was requested on an empty file list.
    #[error("No files to {0}")]
    EmptySelection(&'static str),
}
