//! Core types for sievefile.
//!
//! This crate provides the data model shared by the scanning pipeline and its
//! consumers: scan options, jobs, flat file entries, per-path results, errors,
//! and an arena-indexed tree for presenting results.

mod config;
mod entry;
mod error;
mod tree;

pub use config::{
    DEFAULT_BINARY_SIZE_LIMIT, DEFAULT_BUFFER_SIZE, MAX_WORKER_COUNT, ScanOptions,
    ScanOptionsBuilder,
};
pub use entry::{FileEntry, Job, ScanResult};
pub use error::ScanError;
pub use tree::{EntryTree, NodeId, ScanStats, TreeNode};
