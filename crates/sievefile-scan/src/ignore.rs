//! Layered gitignore-style exclusion rules.
//!
//! Rules come from up to three sources, read in order: the version-control
//! ignore file, the project-specific override file, and any extra patterns
//! passed in [`ScanOptions`](sievefile_core::ScanOptions). All of them are
//! compiled once, before scanning starts, and never change afterwards.
//!
//! Evaluation walks the path one level at a time, from the top. At each
//! level a normal rule marks the prefix ignored and a negation rule for the
//! same prefix clears it again, regardless of rule order. The first prefix
//! left ignored excludes everything below it.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Base ignore file, read first.
pub const BASE_IGNORE_FILE: &str = ".gitignore";

/// Project-specific ignore file, layered on top of the base file.
pub const OVERRIDE_IGNORE_FILE: &str = ".sieveignore";

/// Where a rule was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    /// The base ignore file.
    Base,
    /// The override ignore file.
    Override,
    /// Patterns supplied programmatically.
    Extra,
}

/// A single compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pattern: String,
    negated: bool,
    dir_only: bool,
    anchored: bool,
    source: RuleSource,
    matcher: GlobSet,
}

impl IgnoreRule {
    /// Parse one line of an ignore file.
    ///
    /// Returns `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str, source: RuleSource) -> Result<Option<Self>, globset::Error> {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let dir_only = body.ends_with('/');
        let body = body.trim_end_matches('/');
        let anchored = body.starts_with('/');
        let body = body.trim_start_matches('/');

        if body.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        builder.add(GlobBuilder::new(body).literal_separator(true).build()?);
        if !anchored && !body.starts_with("**/") {
            builder.add(
                GlobBuilder::new(&format!("**/{body}"))
                    .literal_separator(true)
                    .build()?,
            );
        }

        Ok(Some(Self {
            pattern: line.to_string(),
            negated,
            dir_only,
            anchored,
            source,
            matcher: builder.build()?,
        }))
    }

    /// The pattern as written.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether this rule re-includes matching paths.
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether this rule only applies to directories.
    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// Whether this rule only matches relative to the scan root.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Where this rule came from.
    pub fn source(&self) -> RuleSource {
        self.source
    }

    fn matches(&self, candidate: &str, is_dir: bool) -> bool {
        (is_dir || !self.dir_only) && self.matcher.is_match(candidate)
    }
}

/// Compiled ignore rules for one scan root.
#[derive(Debug, Clone)]
pub struct IgnoreEngine {
    root: PathBuf,
    rules: Vec<IgnoreRule>,
}

impl IgnoreEngine {
    /// Load the ignore files found at `root`, then layer `extra` on top.
    ///
    /// Missing files are skipped; unreadable files and invalid patterns are
    /// logged and skipped.
    pub fn load(root: &Path, extra: &[String]) -> Self {
        let mut engine = Self::empty(root);

        for (file, source) in [
            (BASE_IGNORE_FILE, RuleSource::Base),
            (OVERRIDE_IGNORE_FILE, RuleSource::Override),
        ] {
            let path = root.join(file);
            match std::fs::read_to_string(&path) {
                Ok(content) => engine.extend(content.lines(), source),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to read ignore file");
                }
            }
        }

        engine.extend(extra.iter().map(String::as_str), RuleSource::Extra);
        tracing::debug!(root = %root.display(), rules = engine.rules.len(), "ignore rules loaded");
        engine
    }

    /// Build an engine from in-memory patterns.
    pub fn from_patterns<'a>(
        root: &Path,
        patterns: impl IntoIterator<Item = &'a str>,
        source: RuleSource,
    ) -> Self {
        let mut engine = Self::empty(root);
        engine.extend(patterns, source);
        engine
    }

    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            rules: Vec::new(),
        }
    }

    fn extend<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>, source: RuleSource) {
        for line in lines {
            match IgnoreRule::parse(line, source) {
                Ok(Some(rule)) => self.rules.push(rule),
                Ok(None) => {}
                Err(err) => tracing::warn!(pattern = line, %err, "skipping invalid ignore pattern"),
            }
        }
    }

    /// The scan root the rules are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded rules, in evaluation order.
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules were loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `relative` (a path below the root) is excluded.
    ///
    /// The empty path (the root itself) is never ignored.
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect();
        if parts.is_empty() || self.rules.is_empty() {
            return false;
        }

        let mut candidate = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                candidate.push('/');
            }
            candidate.push_str(part);

            // Every ancestor is a directory; the leaf is one only if the caller says so.
            let candidate_is_dir = i + 1 < parts.len() || is_dir;
            if self.excludes(&candidate, candidate_is_dir) {
                return true;
            }
        }
        false
    }

    /// Whether a single prefix is excluded once negations are applied.
    fn excludes(&self, candidate: &str, is_dir: bool) -> bool {
        self.rules
            .iter()
            .any(|r| !r.negated && r.matches(candidate, is_dir))
            && !self
                .rules
                .iter()
                .any(|r| r.negated && r.matches(candidate, is_dir))
    }

    /// Like [`is_ignored`](Self::is_ignored), but for an absolute path.
    ///
    /// Paths outside the root are never ignored.
    pub fn is_ignored_path(&self, path: &Path, is_dir: bool) -> bool {
        path.strip_prefix(&self.root)
            .is_ok_and(|relative| self.is_ignored(relative, is_dir))
    }
}
