//! Scan configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Hard cap on the number of concurrent workers.
pub const MAX_WORKER_COUNT: usize = 50;

/// Channel capacity used when none (or zero) is given.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Files larger than this are never sampled for binary content.
pub const DEFAULT_BINARY_SIZE_LIMIT: u64 = 1024 * 1024;

/// Options for a single scan. Immutable once the scan has started.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanOptions {
    /// Maximum depth to traverse (0 = unlimited).
    #[builder(default = "0")]
    #[serde(default)]
    pub max_depth: usize,

    /// Follow symbolic links into directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Classify regular files as binary or text.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub detect_binary: bool,

    /// Capacity of the job and result channels.
    #[builder(default = "DEFAULT_BUFFER_SIZE")]
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Number of workers (0 = auto-detect, capped at [`MAX_WORKER_COUNT`]).
    #[builder(default = "0")]
    #[serde(default)]
    pub worker_count: usize,

    /// Upper bound on the whole scan (zero = no timeout).
    #[builder(default = "Duration::ZERO")]
    #[serde(default)]
    pub timeout: Duration,

    /// Size above which files are not sampled for binary content.
    #[builder(default = "DEFAULT_BINARY_SIZE_LIMIT")]
    #[serde(default = "default_binary_size_limit")]
    pub binary_size_limit: u64,

    /// Emit directories as entries, not just files and symlinks.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_dirs: bool,

    /// Extra ignore patterns, layered after the ignore files.
    #[builder(default)]
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_binary_size_limit() -> u64 {
    DEFAULT_BINARY_SIZE_LIMIT
}

impl ScanOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.buffer_size == Some(0) {
            return Err("Buffer size must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl ScanOptions {
    /// Create a new scan options builder.
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    /// Whether a directory found at `depth` should be descended into.
    pub fn should_descend(&self, depth: usize) -> bool {
        self.max_depth == 0 || depth < self.max_depth
    }

    /// The scan deadline, if a timeout is configured.
    pub fn deadline(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            follow_symlinks: false,
            detect_binary: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            worker_count: 0,
            timeout: Duration::ZERO,
            binary_size_limit: DEFAULT_BINARY_SIZE_LIMIT,
            include_dirs: false,
            extra_patterns: Vec::new(),
        }
    }
}
