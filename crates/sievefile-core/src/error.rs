//! Error types for scanning operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during scanning.
///
/// Setup errors (`NotFound`, `NotADirectory`, `InvalidConfig`) are returned
/// before any concurrency starts. Everything else is reported per path
/// through [`ScanResult::Error`](crate::ScanResult::Error).
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A worker failed while processing a job.
    #[error("Worker failed: {message}")]
    Worker { message: String },

    /// One or more paths failed during an otherwise completed scan.
    #[error("{count} path(s) failed during scan; first error: {first}")]
    Partial { count: usize, first: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Combine per-path errors into a single [`ScanError::Partial`].
    ///
    /// Returns `None` when there is nothing to report.
    pub fn aggregate(errors: &[ScanError]) -> Option<Self> {
        let first = errors.first()?;
        Some(Self::Partial {
            count: errors.len(),
            first: first.to_string(),
        })
    }
}
