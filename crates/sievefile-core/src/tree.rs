//! Scan statistics and arena-indexed tree assembly.
//!
//! The scanner itself only produces flat [`FileEntry`] values. Consumers that
//! want a navigable hierarchy can build an [`EntryTree`], which stores nodes in
//! a `Vec` and links them by [`NodeId`] instead of by reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::entry::FileEntry;

/// Summary statistics for a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Regular files emitted.
    pub files: u64,
    /// Directories emitted.
    pub dirs: u64,
    /// Symbolic links emitted.
    pub symlinks: u64,
    /// Files classified as binary.
    pub binary_files: u64,
    /// Sum of emitted regular file sizes.
    pub total_size: u64,
    /// Paths that produced an error.
    pub errors: u64,
    /// Paths pruned by ignore rules (subtrees count once).
    pub ignored: u64,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with an emitted entry.
    pub fn record(&mut self, entry: &FileEntry) {
        if entry.is_dir {
            self.dirs += 1;
        } else if entry.is_symlink {
            self.symlinks += 1;
        } else {
            self.files += 1;
            self.total_size += entry.size;
            if entry.is_binary {
                self.binary_files += 1;
            }
        }
    }

    /// Record a failed path.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Files that are not binary.
    pub fn text_files(&self) -> u64 {
        self.files - self.binary_files
    }
}

/// Index of a node within an [`EntryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A node in an [`EntryTree`].
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Display name.
    pub name: CompactString,
    /// Absolute path.
    pub path: PathBuf,
    /// Whether this node is a directory.
    pub is_dir: bool,
    /// The scanned entry, or `None` for the root and synthesized directories.
    pub entry: Option<FileEntry>,
    /// Parent node (`None` for the root).
    pub parent: Option<NodeId>,
    /// Child nodes, directories first, then by name.
    pub children: Vec<NodeId>,
}

/// Hierarchy assembled from a flat list of entries.
#[derive(Debug, Clone)]
pub struct EntryTree {
    nodes: Vec<TreeNode>,
}

impl EntryTree {
    /// Assemble a tree rooted at `root`.
    ///
    /// Entries outside `root` are skipped. Directories that were not emitted
    /// themselves (the default) are synthesized from their descendants.
    pub fn build(root: &Path, entries: &[FileEntry]) -> Self {
        let root_name = root
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(root.to_string_lossy()));

        let mut tree = Self {
            nodes: vec![TreeNode {
                name: root_name,
                path: root.to_path_buf(),
                is_dir: true,
                entry: None,
                parent: None,
                children: Vec::new(),
            }],
        };
        let mut index: HashMap<PathBuf, NodeId> = HashMap::new();
        index.insert(root.to_path_buf(), tree.root());

        for entry in entries {
            let Ok(relative) = entry.path.strip_prefix(root) else {
                continue;
            };

            let mut parent = tree.root();
            let mut current = root.to_path_buf();
            let components: Vec<_> = relative.components().collect();
            let Some((_, ancestors)) = components.split_last() else {
                continue;
            };

            for component in ancestors {
                current.push(component);
                parent = match index.get(&current) {
                    Some(&id) => id,
                    None => {
                        let id = tree.push(parent, &current, true, None);
                        index.insert(current.clone(), id);
                        id
                    }
                };
            }

            match index.get(&entry.path) {
                // A directory synthesized earlier now gets its real entry.
                Some(&id) => tree.nodes[id.0].entry = Some(entry.clone()),
                None => {
                    let id = tree.push(parent, &entry.path, entry.is_dir, Some(entry.clone()));
                    index.insert(entry.path.clone(), id);
                }
            }
        }

        tree.sort_children();
        tree
    }

    fn push(
        &mut self,
        parent: NodeId,
        path: &Path,
        is_dir: bool,
        entry: Option<FileEntry>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_default();

        self.nodes.push(TreeNode {
            name,
            path: path.to_path_buf(),
            is_dir,
            entry,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn sort_children(&mut self) {
        for i in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[i].children);
            children.sort_by(|a, b| {
                let (a, b) = (&self.nodes[a.0], &self.nodes[b.0]);
                b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name))
            });
            self.nodes[i].children = children;
        }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// Total number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Pre-order traversal yielding `(depth, id)`; the root is at depth 0.
    pub fn walk(&self) -> Vec<(usize, NodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0, self.root())];

        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn entry(path: &str, is_dir: bool, size: u64) -> FileEntry {
        let path = PathBuf::from(path);
        FileEntry {
            name: path
                .file_name()
                .map(|n| CompactString::new(n.to_string_lossy()))
                .unwrap_or_default(),
            path,
            is_dir,
            is_symlink: false,
            is_binary: false,
            size,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ScanStats::new();
        stats.record(&entry("/r/a.txt", false, 10));
        let mut bin = entry("/r/b.png", false, 5);
        bin.is_binary = true;
        stats.record(&bin);
        stats.record(&entry("/r/src", true, 4096));
        stats.record_error();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.dirs, 1);
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.text_files(), 1);
        assert_eq!(stats.total_size, 15);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_tree_synthesizes_directories() {
        let entries = vec![
            entry("/r/zeta.txt", false, 1),
            entry("/r/src/main.rs", false, 1),
            entry("/r/src/lib.rs", false, 1),
            entry("/r/alpha.txt", false, 1),
        ];
        let tree = EntryTree::build(Path::new("/r"), &entries);

        // root + src + 4 files
        assert_eq!(tree.len(), 6);

        let names: Vec<_> = tree
            .node(tree.root())
            .children
            .iter()
            .map(|&id| tree.node(id).name.to_string())
            .collect();
        assert_eq!(names, vec!["src", "alpha.txt", "zeta.txt"]);

        let src = tree.node(tree.root()).children[0];
        assert!(tree.node(src).is_dir);
        assert!(tree.node(src).entry.is_none());
        assert_eq!(tree.node(src).parent, Some(tree.root()));
    }

    #[test]
    fn test_tree_attaches_directory_entries() {
        let entries = vec![entry("/r/src/main.rs", false, 1), entry("/r/src", true, 0)];
        let tree = EntryTree::build(Path::new("/r"), &entries);

        assert_eq!(tree.len(), 3);
        let src = tree.node(tree.root()).children[0];
        assert!(tree.node(src).entry.is_some());
    }

    #[test]
    fn test_walk_preorder() {
        let entries = vec![entry("/r/b.txt", false, 1), entry("/r/a/c.txt", false, 1)];
        let tree = EntryTree::build(Path::new("/r"), &entries);

        let order: Vec<_> = tree
            .walk()
            .into_iter()
            .map(|(depth, id)| (depth, tree.node(id).name.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, "r".to_string()),
                (1, "a".to_string()),
                (2, "c.txt".to_string()),
                (1, "b.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_entries_outside_root_skipped() {
        let tree = EntryTree::build(Path::new("/r"), &[entry("/other/x", false, 1)]);
        assert!(tree.is_empty());
    }
}
