//! sieve - concurrent, gitignore-aware directory scanner.
//!
//! Usage:
//!   sieve [PATH]             Scan and list non-ignored files
//!   sieve scan [PATH]        Scan with options (depth, workers, format, ...)
//!   sieve init [PATH]        Write a starter .sieveignore
//!   sieve --help             Show help

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sievefile_scan::{
    DEFAULT_BINARY_SIZE_LIMIT, DEFAULT_BUFFER_SIZE, DirectoryScanner, EntryTree,
    OVERRIDE_IGNORE_FILE, ScanOptions, ScanReport,
};

/// Template written by `sieve init`.
const STARTER_IGNORE: &str = "\
# sieve ignore file
#
# Patterns use gitignore syntax and are applied on top of .gitignore.
#   build/      directory-only (also excludes everything beneath it)
#   /target     anchored to the scan root
#   *.log       matches at any depth
#   !keep.log   re-includes a path excluded by another pattern

# Version control
.git/
.hg/
.svn/

# Dependencies
node_modules/
vendor/
.venv/
__pycache__/

# Build output
target/
build/
dist/
out/

# Editors and OS files
.idea/
.vscode/
.DS_Store
*.swp

# Logs and temporary files
*.log
*.tmp
";

#[derive(Parser)]
#[command(
    name = "sieve",
    version,
    about = "Concurrent, gitignore-aware directory scanner",
    long_about = "sieve walks a directory tree in parallel, filters it through .gitignore \
                  and .sieveignore rules, and classifies every file as text or binary.\n\n\
                  Run `sieve [PATH]` for a quick listing, or use subcommands for more control."
)]
struct Cli {
    /// Path to scan (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and report its files
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        args: ScanArgs,
    },

    /// Write a starter .sieveignore file
    Init {
        /// Directory to write the file into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(clap::Args, Default)]
struct ScanArgs {
    /// Maximum depth to traverse (0 = unlimited)
    #[arg(short, long, default_value = "0")]
    depth: usize,

    /// Follow symbolic links into directories
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Skip binary detection
    #[arg(long)]
    no_binary: bool,

    /// Largest file to sample for binary content (e.g., "512KB", "1MB")
    #[arg(long)]
    binary_limit: Option<String>,

    /// Number of workers (0 = one per CPU)
    #[arg(short, long, default_value = "0")]
    workers: usize,

    /// Job and result channel capacity
    #[arg(long, default_value = "100")]
    buffer: usize,

    /// Abort the scan after this long (e.g., "500ms", "30s", "2m")
    #[arg(short, long)]
    timeout: Option<String>,

    /// Also list directories
    #[arg(long)]
    dirs: bool,

    /// Extra ignore pattern (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Tree,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Scan { path, args }) => run_scan(&path, &args).await?,
        Some(Command::Init { path, force }) => run_init(&path, force)?,
        None => run_scan(&cli.path, &ScanArgs::default()).await?,
    }

    Ok(())
}

/// Scan a directory and print the results.
async fn run_scan(path: &Path, args: &ScanArgs) -> Result<()> {
    let options = build_options(args)?;
    let scanner = DirectoryScanner::new(options);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    eprintln!("Scanning {}...", path.display());
    let report = scanner
        .scan_directory_sync(path, &cancel)
        .await
        .with_context(|| format!("Cannot scan {}", path.display()))?;

    match args.format {
        OutputFormat::Text => print_list(&report),
        OutputFormat::Tree => print_tree(&report),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "root": report.root,
                "entries": report.entries,
                "stats": report.stats,
                "cancelled": report.cancelled,
                "error": report.error.as_ref().map(ToString::to_string),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(());
        }
    }

    print_summary(&report);
    Ok(())
}

fn build_options(args: &ScanArgs) -> Result<ScanOptions> {
    let binary_limit = match &args.binary_limit {
        Some(limit) => parse_size(limit)?,
        None => DEFAULT_BINARY_SIZE_LIMIT,
    };
    let timeout = match &args.timeout {
        Some(timeout) => parse_duration(timeout)?,
        None => Duration::ZERO,
    };

    let options = ScanOptions::builder()
        .max_depth(args.depth)
        .follow_symlinks(args.follow_symlinks)
        .detect_binary(!args.no_binary)
        .binary_size_limit(binary_limit)
        .worker_count(args.workers)
        .buffer_size(if args.buffer == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            args.buffer
        })
        .timeout(timeout)
        .include_dirs(args.dirs)
        .extra_patterns(args.ignore.clone())
        .build()?;
    Ok(options)
}

/// Write the starter ignore file.
fn run_init(path: &Path, force: bool) -> Result<()> {
    if !path.is_dir() {
        bail!("Not a directory: {}", path.display());
    }

    let target = path.join(OVERRIDE_IGNORE_FILE);
    if target.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    std::fs::write(&target, STARTER_IGNORE)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    println!("Created {}", target.display());
    Ok(())
}

/// Print one line per entry.
fn print_list(report: &ScanReport) {
    for entry in &report.entries {
        let relative = entry.path.strip_prefix(&report.root).unwrap_or(&entry.path);
        let kind = if entry.is_dir {
            "dir"
        } else if entry.is_symlink {
            "link"
        } else if entry.is_binary {
            "binary"
        } else {
            "text"
        };
        println!(
            "{:<6} {:>10}  {}",
            kind,
            format_size(entry.size),
            relative.display()
        );
    }
}

/// Print entries as an indented tree, directories first.
fn print_tree(report: &ScanReport) {
    let tree = EntryTree::build(&report.root, &report.entries);

    for (depth, id) in tree.walk() {
        let node = tree.node(id);
        let indent = "  ".repeat(depth);
        if depth == 0 {
            println!("{}", report.root.display());
        } else if node.is_dir {
            println!("{indent}▼ {}/", node.name);
        } else {
            let marker = match &node.entry {
                Some(entry) if entry.is_binary => " [binary]",
                _ => "",
            };
            println!("{indent}  {}{marker}", node.name);
        }
    }
}

fn print_summary(report: &ScanReport) {
    let stats = &report.stats;
    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} files ({} text, {} binary), {}",
        stats.files,
        stats.text_files(),
        stats.binary_files,
        format_size(stats.total_size)
    );
    if stats.dirs > 0 || stats.symlinks > 0 {
        println!(" {} directories, {} symlinks", stats.dirs, stats.symlinks);
    }
    println!(" {} ignored", stats.ignored);
    println!("{}", "─".repeat(60));

    if report.is_clean() {
        return;
    }
    if report.cancelled {
        println!("Scan was cancelled; results are incomplete.");
    }
    if let Some(err) = &report.error {
        println!("{err}");
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let number = |s: &str| -> Result<f64> {
        s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()
            .with_context(|| format!("Invalid size: {s}"))
    };

    let (num, multiplier) = if s.ends_with("GB") || s.ends_with('G') {
        (number(&s)?, 1024 * 1024 * 1024)
    } else if s.ends_with("MB") || s.ends_with('M') {
        (number(&s)?, 1024 * 1024)
    } else if s.ends_with("KB") || s.ends_with('K') {
        (number(&s)?, 1024)
    } else {
        (number(&s)?, 1)
    };

    Ok((num * multiplier as f64) as u64)
}

/// Parse a duration string (e.g., "250ms", "30s", "2m", "1h").
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let number = |digits: &str| -> Result<f64> {
        digits
            .parse()
            .with_context(|| format!("Invalid duration: {s}"))
    };

    let seconds = if let Some(ms) = s.strip_suffix("ms") {
        number(ms)? / 1000.0
    } else if let Some(secs) = s.strip_suffix('s') {
        number(secs)?
    } else if let Some(mins) = s.strip_suffix('m') {
        number(mins)? * 60.0
    } else if let Some(hours) = s.strip_suffix('h') {
        number(hours)? * 60.0 * 60.0
    } else {
        number(&s)? // Default to seconds
    };

    Duration::try_from_secs_f64(seconds).with_context(|| format!("Invalid duration: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1.5m").unwrap(), 1536 * 1024);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("1e300s").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("nan").is_err());
    }

    #[test]
    fn test_build_options() {
        let args = ScanArgs {
            depth: 2,
            workers: 3,
            buffer: 0,
            timeout: Some("1s".to_string()),
            ignore: vec!["*.log".to_string()],
            ..Default::default()
        };
        let options = build_options(&args).unwrap();
        assert_eq!(options.max_depth, 2);
        assert_eq!(options.worker_count, 3);
        assert_eq!(options.buffer_size, 100);
        assert_eq!(options.timeout, Duration::from_secs(1));
        assert!(options.detect_binary);
        assert_eq!(options.extra_patterns, vec!["*.log".to_string()]);
    }

    #[test]
    fn test_init_writes_template_once() {
        let temp = TempDir::new().unwrap();
        run_init(temp.path(), false).unwrap();

        let written = std::fs::read_to_string(temp.path().join(OVERRIDE_IGNORE_FILE)).unwrap();
        assert_eq!(written, STARTER_IGNORE);

        assert!(run_init(temp.path(), false).is_err());
        assert!(run_init(temp.path(), true).is_ok());
    }
}
