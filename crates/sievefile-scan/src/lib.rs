//! Concurrent directory scanning pipeline for sievefile.
//!
//! # Overview
//!
//! `sievefile-scan` walks a directory tree and produces a flat inventory of
//! [`FileEntry`] values:
//!
//! - **Bounded parallelism** via a fixed pool of tokio workers
//! - **Backpressure** through bounded job and result channels
//! - **Layered ignore rules** from `.gitignore` and `.sieveignore`, with
//!   negation
//! - **Binary detection** by signature and NUL-byte sniffing
//! - **Cooperative cancellation** and an optional timeout
//!
//! # Example
//!
//! ```rust,no_run
//! use sievefile_scan::{DirectoryScanner, ScanOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), sievefile_scan::ScanError> {
//! let scanner = DirectoryScanner::new(ScanOptions::default());
//! let report = scanner
//!     .scan_directory_sync("/path/to/project", &CancellationToken::new())
//!     .await?;
//!
//! for entry in &report.entries {
//!     println!("{} (binary: {})", entry.path.display(), entry.is_binary);
//! }
//! if let Some(err) = report.error {
//!     eprintln!("{err}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Streaming
//!
//! ```rust,no_run
//! use sievefile_scan::{DirectoryScanner, ScanOptions, ScanResult};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), sievefile_scan::ScanError> {
//! let scanner = DirectoryScanner::new(ScanOptions::default());
//! let mut stream = scanner.scan_directory(".", &CancellationToken::new()).await?;
//!
//! while let Some(result) = stream.recv().await {
//!     match result {
//!         ScanResult::Entry(entry) => println!("{}", entry.path.display()),
//!         ScanResult::Error(err) => eprintln!("{err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod binary;
mod ignore;
mod pool;
mod scanner;
mod walker;

pub use binary::{BinaryDetector, SAMPLE_SIZE};
pub use ignore::{BASE_IGNORE_FILE, IgnoreEngine, IgnoreRule, OVERRIDE_IGNORE_FILE, RuleSource};
pub use pool::{JobProcessor, WorkerPool, effective_worker_count};
pub use scanner::{DirectoryScanner, EntryProcessor, ScanReport, ScanStream};
pub use walker::{PathWalker, WalkStats};

// Re-export core types for convenience
pub use sievefile_core::{
    DEFAULT_BINARY_SIZE_LIMIT, DEFAULT_BUFFER_SIZE, EntryTree, FileEntry, Job, MAX_WORKER_COUNT,
    NodeId, ScanError, ScanOptions, ScanOptionsBuilder, ScanResult, ScanStats, TreeNode,
};
