//! Directory traversal feeding the worker pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sievefile_core::{Job, ScanError, ScanOptions, ScanResult};

use crate::ignore::IgnoreEngine;
use crate::pool::{JobProcessor, WorkerPool};

/// Counters reported by a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Jobs accepted by the pool.
    pub submitted: u64,
    /// Paths pruned by ignore rules. An ignored directory counts once.
    pub ignored: u64,
    /// Directories that could not be listed. Each one is also reported as an
    /// error result.
    pub unreadable_dirs: u64,
    /// Whether the walk stopped early because of cancellation.
    pub cancelled: bool,
}

/// Producer that discovers entries below a root and submits them as jobs.
///
/// Ignore rules are applied here, before a job exists, so an ignored
/// directory is never listed at all.
pub struct PathWalker<'a, P> {
    root: &'a Path,
    options: &'a ScanOptions,
    ignore: &'a IgnoreEngine,
    pool: &'a WorkerPool<P>,
    visited: HashSet<PathBuf>,
    pending: Vec<(PathBuf, usize)>,
    stats: WalkStats,
}

impl<'a, P: JobProcessor> PathWalker<'a, P> {
    /// Create a walker for `root`, which must be an existing directory.
    pub fn new(
        root: &'a Path,
        options: &'a ScanOptions,
        ignore: &'a IgnoreEngine,
        pool: &'a WorkerPool<P>,
    ) -> Self {
        Self {
            root,
            options,
            ignore,
            pool,
            visited: HashSet::new(),
            pending: Vec::new(),
            stats: WalkStats::default(),
        }
    }

    /// Walk the whole tree. The root itself is not submitted.
    pub async fn walk(mut self) -> WalkStats {
        if self.options.follow_symlinks {
            if let Ok(canonical) = tokio::fs::canonicalize(self.root).await {
                self.visited.insert(canonical);
            }
        }
        self.pending.push((self.root.to_path_buf(), 0));

        while let Some((dir, depth)) = self.pending.pop() {
            if self.is_cancelled() {
                break;
            }

            let mut reader = match tokio::fs::read_dir(&dir).await {
                Ok(reader) => reader,
                Err(err) => {
                    tracing::debug!(path = %dir.display(), %err, "cannot list directory");
                    self.unreadable(&dir, err).await;
                    continue;
                }
            };

            loop {
                if self.is_cancelled() {
                    break;
                }
                match reader.next_entry().await {
                    Ok(Some(entry)) => {
                        if !self.visit(entry.path(), depth + 1).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!(path = %dir.display(), %err, "directory listing interrupted");
                        self.unreadable(&dir, err).await;
                        break;
                    }
                }
            }
        }

        self.stats.cancelled = self.is_cancelled();
        self.stats
    }

    /// Handle one discovered path. Returns `false` once the pool stops
    /// accepting jobs.
    async fn visit(&mut self, path: PathBuf, depth: usize) -> bool {
        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                if self.prune(&path, false) {
                    return true;
                }
                // Let the worker report the failure for this path.
                return self.submit(path, depth).await;
            }
        };

        let file_type = metadata.file_type();
        let descend = if file_type.is_symlink() {
            self.options.follow_symlinks
                && tokio::fs::metadata(&path)
                    .await
                    .is_ok_and(|target| target.is_dir())
        } else {
            file_type.is_dir()
        };

        if self.prune(&path, descend || file_type.is_dir()) {
            return true;
        }

        if (!descend || self.options.include_dirs) && !self.submit(path.clone(), depth).await {
            return false;
        }

        if descend && self.options.should_descend(depth) && self.first_visit(&path).await {
            self.pending.push((path, depth));
        }
        true
    }

    /// Check `path` against the ignore rules, counting it if it is pruned.
    fn prune(&mut self, path: &Path, is_dir: bool) -> bool {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        if !self.ignore.is_ignored(relative, is_dir) {
            return false;
        }
        tracing::debug!(path = %path.display(), "ignored");
        self.stats.ignored += 1;
        true
    }

    async fn unreadable(&mut self, dir: &Path, err: std::io::Error) {
        self.stats.unreadable_dirs += 1;
        self.pool
            .forward(ScanResult::Error(ScanError::io(dir, err)))
            .await;
    }

    async fn submit(&mut self, path: PathBuf, depth: usize) -> bool {
        let accepted = self.pool.submit(Job::new(path, depth)).await;
        if accepted {
            self.stats.submitted += 1;
        }
        accepted
    }

    /// Break symlink cycles when links are followed.
    async fn first_visit(&mut self, dir: &Path) -> bool {
        if !self.options.follow_symlinks {
            return true;
        }
        match tokio::fs::canonicalize(dir).await {
            Ok(canonical) => self.visited.insert(canonical),
            Err(_) => false,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.pool.cancellation().is_cancelled()
    }
}
