use std::collections::{BTreeMap, VecDeque};

use crate::index::PakIndex;

pub const PATH_SEPARATOR: char = '/';

/// Virtual directory tree derived from the flat entry names of a [`PakIndex`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryTree {
    root: DirNode,
    directory_count: usize,
    file_count: usize,
}

#[derive(Debug, Clone, Default)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    /// Leaf name -> active index.
    files: BTreeMap<String, usize>,
}

/// One node yielded by [`DirectoryTree::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub path: String,
    pub is_dir: bool,
    /// Active index of the entry for file leaves.
    pub entry: Option<usize>,
}

impl DirectoryTree {
    pub fn build(index: &PakIndex) -> Self {
        let mut tree = Self::default();
        for (entry_index, entry) in index.list_in_order().enumerate() {
            let mut segments: Vec<&str> = entry
                .name()
                .split(PATH_SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .collect();
            let Some(leaf) = segments.pop() else {
                continue;
            };

            let mut node = &mut tree.root;
            for segment in segments {
                if !node.dirs.contains_key(segment) {
                    tree.directory_count += 1;
                }
                node = node.dirs.entry(segment.to_string()).or_default();
            }
            node.files.insert(leaf.to_string(), entry_index);
            tree.file_count += 1;
        }
        tree
    }

    pub fn directory_count(&self) -> usize {
        self.directory_count
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Breadth-first traversal. Every call starts over from the root.
    pub fn walk(&self) -> TreeWalk<'_> {
        let mut queue = VecDeque::new();
        queue.push_back((String::new(), &self.root));
        TreeWalk {
            queue,
            pending: VecDeque::new(),
        }
    }

    /// All directory paths, breadth-first.
    pub fn directories(&self) -> Vec<String> {
        self.walk().filter(|item| item.is_dir).map(|item| item.path).collect()
    }

    /// Direct children of `dir` (empty string for the root), directories first.
    pub fn children(&self, dir: &str) -> Option<Vec<TreeItem>> {
        let node = self.find(dir)?;
        let prefix = dir.trim_matches(PATH_SEPARATOR);
        Some(child_items(prefix, node).collect())
    }

    /// Active indices of the files stored directly in `dir`.
    pub fn files_in(&self, dir: &str) -> Vec<usize> {
        self.find(dir)
            .map(|node| node.files.values().copied().collect())
            .unwrap_or_default()
    }

    fn find(&self, dir: &str) -> Option<&DirNode> {
        let mut node = &self.root;
        for segment in dir.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            node = node.dirs.get(segment)?;
        }
        Some(node)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{name}")
    }
}

fn child_items<'a>(prefix: &'a str, node: &'a DirNode) -> impl Iterator<Item = TreeItem> + 'a {
    let dirs = node.dirs.keys().map(move |name| TreeItem {
        path: join(prefix, name),
        is_dir: true,
        entry: None,
    });
    let files = node.files.iter().map(move |(name, index)| TreeItem {
        path: join(prefix, name),
        is_dir: false,
        entry: Some(*index),
    });
    dirs.chain(files)
}

pub struct TreeWalk<'a> {
    queue: VecDeque<(String, &'a DirNode)>,
    pending: VecDeque<TreeItem>,
}

impl Iterator for TreeWalk<'_> {
    type Item = TreeItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let (path, node) = self.queue.pop_front()?;
            for (name, child) in &node.dirs {
                self.queue.push_back((join(&path, name), child));
            }
            self.pending.extend(child_items(&path, node));
        }
    }
}
