use sievefile_core::{
    EntryTree, FileEntry, Job, MAX_WORKER_COUNT, ScanError, ScanOptions, ScanResult, ScanStats,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_job_creation() {
    let job = Job::new("/tmp/a.txt", 2);
    assert_eq!(job.path, PathBuf::from("/tmp/a.txt"));
    assert_eq!(job.depth, 2);
    assert_eq!(job, Job::new(PathBuf::from("/tmp/a.txt"), 2));
}

#[test]
fn test_scan_options_builder() {
    let options = ScanOptions::builder()
        .max_depth(5usize)
        .follow_symlinks(true)
        .detect_binary(false)
        .buffer_size(16usize)
        .worker_count(MAX_WORKER_COUNT * 2)
        .timeout(Duration::from_millis(250))
        .include_dirs(true)
        .extra_patterns(vec!["*.tmp".to_string(), "build/".to_string()])
        .build()
        .unwrap();

    assert_eq!(options.max_depth, 5);
    assert!(options.follow_symlinks);
    assert!(!options.detect_binary);
    assert_eq!(options.buffer_size, 16);
    // Clamping is the pool's job; options keep what was asked for.
    assert_eq!(options.worker_count, MAX_WORKER_COUNT * 2);
    assert_eq!(options.deadline(), Some(Duration::from_millis(250)));
    assert!(options.include_dirs);
    assert_eq!(options.extra_patterns.len(), 2);
}

#[test]
fn test_scan_options_serde() {
    let options = ScanOptions {
        max_depth: 2,
        extra_patterns: vec!["*.log".to_string()],
        ..Default::default()
    };

    let json = serde_json::to_string(&options).unwrap();
    let back: ScanOptions = serde_json::from_str(&json).unwrap();

    assert_eq!(back.max_depth, 2);
    assert_eq!(back.extra_patterns, vec!["*.log".to_string()]);
    assert_eq!(back.timeout, Duration::ZERO);
}

#[test]
fn test_entries_feed_stats_and_tree() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("src")).unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("README.md"), "# readme").unwrap();

    let entries: Vec<FileEntry> = ["src/main.rs", "README.md"]
        .iter()
        .map(|rel| {
            let path = root.join(rel);
            let metadata = fs::symlink_metadata(&path).unwrap();
            FileEntry::from_metadata(path, &metadata)
        })
        .collect();

    let mut stats = ScanStats::new();
    for entry in &entries {
        stats.record(entry);
    }
    assert_eq!(stats.files, 2);
    assert_eq!(stats.total_size, 12 + 8);

    let tree = EntryTree::build(root, &entries);
    let top: Vec<_> = tree
        .node(tree.root())
        .children
        .iter()
        .map(|&id| tree.node(id).name.to_string())
        .collect();
    assert_eq!(top, vec!["src", "README.md"]);
}

#[test]
fn test_scan_result_is_exactly_one() {
    let temp = TempDir::new().unwrap();
    let metadata = fs::symlink_metadata(temp.path()).unwrap();
    let ok: ScanResult = FileEntry::from_metadata(temp.path(), &metadata).into();
    assert!(ok.entry().is_some() && ok.error().is_none());

    let missing = temp.path().join("missing");
    let err: ScanResult = ScanError::io(
        &missing,
        fs::symlink_metadata(&missing).unwrap_err(),
    )
    .into();
    assert!(err.entry().is_none());
    assert!(matches!(err.error(), Some(ScanError::NotFound { .. })));
}
