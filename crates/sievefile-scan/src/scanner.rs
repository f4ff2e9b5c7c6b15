//! Streaming and collecting scan entry points.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sievefile_core::{FileEntry, Job, ScanError, ScanOptions, ScanResult, ScanStats};

use crate::binary::BinaryDetector;
use crate::ignore::IgnoreEngine;
use crate::pool::{JobProcessor, WorkerPool};
use crate::walker::{PathWalker, WalkStats};

/// Per-path processing run inside the workers.
#[derive(Debug, Clone)]
pub struct EntryProcessor {
    detector: Option<BinaryDetector>,
}

impl EntryProcessor {
    /// Create a processor configured from scan options.
    pub fn new(options: &ScanOptions) -> Self {
        Self {
            detector: options
                .detect_binary
                .then(|| BinaryDetector::new(options.binary_size_limit)),
        }
    }

    /// Stat `path` (without following symlinks) and classify it.
    pub fn scan_path(&self, path: &Path) -> ScanResult {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => return ScanError::io(path, err).into(),
        };

        let mut entry = FileEntry::from_metadata(path, &metadata);
        if let Some(detector) = &self.detector {
            if metadata.is_file() && detector.within_limit(metadata.len()) {
                entry.is_binary = detector.is_binary(path);
            }
        }
        entry.into()
    }
}

impl JobProcessor for EntryProcessor {
    fn process(&self, job: Job) -> Vec<ScanResult> {
        vec![self.scan_path(&job.path)]
    }
}

/// A running scan.
///
/// Results arrive in no particular order. The stream ends once the walker has
/// finished and every worker has drained, or promptly after cancellation.
#[derive(Debug)]
pub struct ScanStream {
    root: PathBuf,
    results: mpsc::Receiver<ScanResult>,
    producer: JoinHandle<WalkStats>,
}

impl ScanStream {
    /// The canonical scan root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive the next result, or `None` once the scan is over.
    pub async fn recv(&mut self) -> Option<ScanResult> {
        self.results.recv().await
    }

    /// Stop consuming and wait for the producer to wind down.
    ///
    /// Any unread results are discarded.
    pub async fn finish(self) -> WalkStats {
        drop(self.results);
        match self.producer.await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!(%err, "scan producer ended abnormally");
                WalkStats::default()
            }
        }
    }

    /// The raw result receiver. The producer keeps running in the background.
    pub fn into_inner(self) -> mpsc::Receiver<ScanResult> {
        self.results
    }
}

/// Outcome of a collected scan.
#[derive(Debug)]
pub struct ScanReport {
    /// The canonical scan root.
    pub root: PathBuf,
    /// Every successfully scanned entry, sorted by path.
    pub entries: Vec<FileEntry>,
    /// Summary counts, including ignored paths.
    pub stats: ScanStats,
    /// Whether the scan was cut short by cancellation or timeout.
    pub cancelled: bool,
    /// Aggregate of all per-path errors, if any occurred.
    pub error: Option<ScanError>,
}

impl ScanReport {
    /// Whether every discovered path was scanned without error.
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

/// Concurrent directory scanner.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    options: ScanOptions,
}

impl DirectoryScanner {
    /// Create a scanner with the given options.
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// The options every scan from this scanner uses.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Start scanning `root` and return the result stream immediately.
    ///
    /// Fails before any task is spawned if `root` does not exist or is not a
    /// directory. Cancelling `cancel` (or hitting the configured timeout)
    /// ends the stream early.
    pub async fn scan_directory(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<ScanStream, ScanError> {
        let root = resolve_root(root.as_ref()).await?;
        let ignore = IgnoreEngine::load(&root, &self.options.extra_patterns);

        let scan_token = cancel.child_token();
        if let Some(deadline) = self.options.deadline() {
            let token = scan_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(deadline) => {
                        tracing::info!(?deadline, "scan timed out");
                        token.cancel();
                    }
                }
            });
        }

        let mut pool = WorkerPool::new(
            self.options.worker_count,
            self.options.buffer_size,
            EntryProcessor::new(&self.options),
        )
        .with_cancellation(&scan_token);
        let Some(results) = pool.take_results() else {
            return Err(ScanError::Other {
                message: "result stream unavailable".to_string(),
            });
        };

        tracing::info!(
            root = %root.display(),
            workers = pool.worker_count(),
            rules = ignore.len(),
            "scan started"
        );
        pool.start();

        let options = self.options.clone();
        let walk_root = root.clone();
        let producer = tokio::spawn(async move {
            // Ends the timeout timer once the scan is done.
            let _guard = scan_token.drop_guard();
            let stats = PathWalker::new(&walk_root, &options, &ignore, &pool)
                .walk()
                .await;
            pool.stop().await;
            stats
        });

        Ok(ScanStream {
            root,
            results,
            producer,
        })
    }

    /// Scan `root` to completion and collect the results.
    ///
    /// Per-path failures do not fail the call: they are folded into
    /// [`ScanReport::error`] while every successful entry is still returned.
    pub async fn scan_directory_sync(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let mut stream = self.scan_directory(root, cancel).await?;

        let mut entries = Vec::new();
        let mut errors = Vec::new();
        let mut stats = ScanStats::new();
        while let Some(result) = stream.recv().await {
            match result {
                ScanResult::Entry(entry) => {
                    stats.record(&entry);
                    entries.push(entry);
                }
                ScanResult::Error(err) => {
                    tracing::debug!(%err, "path failed");
                    stats.record_error();
                    errors.push(err);
                }
            }
        }

        let root = stream.root().to_path_buf();
        let walk = stream.finish().await;
        stats.ignored = walk.ignored;
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let error = ScanError::aggregate(&errors);
        tracing::info!(
            root = %root.display(),
            entries = entries.len(),
            errors = errors.len(),
            ignored = walk.ignored,
            cancelled = walk.cancelled,
            "scan finished"
        );

        Ok(ScanReport {
            root,
            entries,
            stats,
            cancelled: walk.cancelled,
            error,
        })
    }
}

/// Canonicalize `root` and make sure it is a directory.
async fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    let canonical = tokio::fs::canonicalize(root)
        .await
        .map_err(|err| ScanError::io(root, err))?;
    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|err| ScanError::io(&canonical, err))?;

    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory { path: canonical });
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_processor_classifies_files() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("a.txt");
        let binary = temp.path().join("a.bin");
        fs::write(&text, "hello").unwrap();
        fs::write(&binary, b"\x7fELF\x02\x01\x01").unwrap();

        let processor = EntryProcessor::new(&ScanOptions::default());
        assert!(!processor.scan_path(&text).entry().unwrap().is_binary);
        assert!(processor.scan_path(&binary).entry().unwrap().is_binary);
    }

    #[test]
    fn test_processor_detection_disabled() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("a.bin");
        fs::write(&binary, b"\x00\x01\x02").unwrap();

        let options = ScanOptions {
            detect_binary: false,
            ..Default::default()
        };
        let processor = EntryProcessor::new(&options);
        assert!(!processor.scan_path(&binary).entry().unwrap().is_binary);
    }

    #[test]
    fn test_processor_reports_missing_path() {
        let temp = TempDir::new().unwrap();
        let processor = EntryProcessor::new(&ScanOptions::default());
        let results = processor.process(Job::new(temp.path().join("gone"), 1));

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].error(), Some(ScanError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_root_rejects_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(
            resolve_root(&file).await,
            Err(ScanError::NotADirectory { .. })
        ));
        assert!(matches!(
            resolve_root(&temp.path().join("missing")).await,
            Err(ScanError::NotFound { .. })
        ));
        assert!(resolve_root(temp.path()).await.unwrap().is_absolute());
    }
}
