//! Scan work units and their outcomes.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// One unit of scan work: a discovered path and its depth below the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    /// Absolute path to process.
    pub path: PathBuf,
    /// Depth below the scan root (direct children are at depth 1).
    pub depth: usize,
}

impl Job {
    /// Create a new job.
    pub fn new(path: impl Into<PathBuf>, depth: usize) -> Self {
        Self {
            path: path.into(),
            depth,
        }
    }
}

/// A single scanned file system entry.
///
/// Entries are flat: they carry no links to parents or children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path.
    pub path: PathBuf,

    /// File name (last path component).
    pub name: CompactString,

    /// Whether the entry is a directory.
    pub is_dir: bool,

    /// Whether the entry itself is a symbolic link.
    pub is_symlink: bool,

    /// Whether the entry was classified as binary content.
    pub is_binary: bool,

    /// Size in bytes as reported by `lstat`.
    pub size: u64,

    /// Last modification time.
    pub modified: SystemTime,
}

impl FileEntry {
    /// Build an entry from `lstat`-style metadata.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        let path = path.into();
        let name = entry_name(&path);
        let file_type = metadata.file_type();

        Self {
            name,
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            is_binary: false,
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            path,
        }
    }

    /// Whether the entry is a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_dir && !self.is_symlink
    }
}

fn entry_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

/// Outcome of processing one [`Job`]: exactly one entry or one error.
#[derive(Debug)]
pub enum ScanResult {
    /// The path was scanned successfully.
    Entry(FileEntry),
    /// The path could not be scanned.
    Error(ScanError),
}

impl ScanResult {
    /// Borrow the entry, if this result carries one.
    pub fn entry(&self) -> Option<&FileEntry> {
        match self {
            Self::Entry(entry) => Some(entry),
            Self::Error(_) => None,
        }
    }

    /// Borrow the error, if this result carries one.
    pub fn error(&self) -> Option<&ScanError> {
        match self {
            Self::Entry(_) => None,
            Self::Error(err) => Some(err),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<FileEntry, ScanError> {
        match self {
            Self::Entry(entry) => Ok(entry),
            Self::Error(err) => Err(err),
        }
    }
}

impl From<FileEntry> for ScanResult {
    fn from(entry: FileEntry) -> Self {
        Self::Entry(entry)
    }
}

impl From<ScanError> for ScanResult {
    fn from(err: ScanError) -> Self {
        Self::Error(err)
    }
}
