//! File Tree Selection
//!
//! Flat arena representation of a project's file tree with two derived
//! per-node flags:
//!
//! - `hidden` - computed bottom-up from [`FilterRules`]. A file is hidden when
//!   it does not match the extension filter; a directory is hidden when it has
//!   no visible descendant.
//! - `selected` - set top-down when a node is toggled (cascading to every
//!   descendant, hidden or not) and recomputed bottom-up for every ancestor as
//!   the AND of its visible children.
//!
//! Entries are stored in pre-order, so a parent's index is always smaller than
//! its children's. Reverse index order is therefore a valid bottom-up pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Kind of a file tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// A node of the file tree as produced by a directory listing.
///
/// `id` is the node's absolute path and is unique within one tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    /// Create a file node
    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::File,
            children: None,
        }
    }

    /// Create a directory node
    pub fn directory(id: impl Into<String>, name: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Directory,
            children: Some(children),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Visibility rules applied to a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    /// File name suffixes to keep (e.g. `.rs`). Empty keeps every file.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl FilterRules {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// Rules that keep every file visible.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether a file with this name passes the filter.
    ///
    /// Matching is a case-insensitive suffix test. Blank entries are ignored.
    pub fn matches_file(&self, name: &str) -> bool {
        let mut extensions = self
            .extensions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .peekable();

        if extensions.peek().is_none() {
            return true;
        }

        let lower = name.to_lowercase();
        extensions.any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}

/// Snapshot of a tree node with its derived selection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectableFileNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub selected: bool,
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SelectableFileNode>,
}

#[derive(Debug, Clone)]
struct TreeEntry {
    id: String,
    name: String,
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
    selected: bool,
    hidden: bool,
}

/// Arena of tree nodes keyed by path.
#[derive(Debug, Clone, Default)]
pub struct SelectionTree {
    entries: Vec<TreeEntry>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
}

impl SelectionTree {
    /// Build an arena from a listed tree. Every node starts unselected and visible.
    pub fn from_nodes(tree: &[FileNode]) -> Self {
        let mut arena = Self::default();
        for node in tree {
            let idx = arena.insert(node, None);
            arena.roots.push(idx);
        }
        arena
    }

    /// Build an arena and immediately apply `rules`.
    pub fn filtered(tree: &[FileNode], rules: &FilterRules) -> Self {
        let mut arena = Self::from_nodes(tree);
        arena.apply_filter(rules);
        arena
    }

    fn insert(&mut self, node: &FileNode, parent: Option<usize>) -> usize {
        let idx = self.entries.len();
        self.entries.push(TreeEntry {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            parent,
            children: Vec::new(),
            selected: false,
            hidden: false,
        });
        self.index.insert(node.id.clone(), idx);

        // File nodes never carry children, even if the listing supplied some.
        if node.kind == NodeKind::Directory {
            if let Some(children) = &node.children {
                for child in children {
                    let child_idx = self.insert(child, Some(idx));
                    self.entries[idx].children.push(child_idx);
                }
            }
        }
        idx
    }

    /// Number of nodes (files and directories).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_selected(&self, id: &str) -> Option<bool> {
        self.index.get(id).map(|&idx| self.entries[idx].selected)
    }

    pub fn is_hidden(&self, id: &str) -> Option<bool> {
        self.index.get(id).map(|&idx| self.entries[idx].hidden)
    }

    /// Recompute `hidden` for every node, then re-derive directory selection
    /// against the new set of visible children.
    pub fn apply_filter(&mut self, rules: &FilterRules) {
        for idx in (0..self.entries.len()).rev() {
            let hidden = match self.entries[idx].kind {
                NodeKind::File => !rules.matches_file(&self.entries[idx].name),
                NodeKind::Directory => self.entries[idx]
                    .children
                    .iter()
                    .all(|&child| self.entries[child].hidden),
            };
            self.entries[idx].hidden = hidden;
        }

        for idx in (0..self.entries.len()).rev() {
            if self.entries[idx].kind == NodeKind::Directory {
                self.recompute_directory(idx);
            }
        }
    }

    /// Set the selection state of `target_id`, cascade it to all descendants
    /// and re-derive every ancestor.
    pub fn toggle(&mut self, target_id: &str, selected: bool) -> CoreResult<()> {
        let idx = *self
            .index
            .get(target_id)
            .ok_or_else(|| CoreError::not_found(format!("tree node: {}", target_id)))?;

        self.cascade_down(idx, selected);
        self.recompute_ancestors(idx);
        Ok(())
    }

    /// Select or deselect every node.
    pub fn set_all(&mut self, selected: bool) {
        for entry in &mut self.entries {
            entry.selected = selected;
        }
    }

    fn cascade_down(&mut self, idx: usize, selected: bool) {
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            self.entries[current].selected = selected;
            stack.extend(self.entries[current].children.iter().copied());
        }
    }

    fn recompute_ancestors(&mut self, idx: usize) {
        let mut parent = self.entries[idx].parent;
        while let Some(p) = parent {
            self.recompute_directory(p);
            parent = self.entries[p].parent;
        }
    }

    /// AND of visible children. A directory without visible children keeps
    /// its current state.
    fn recompute_directory(&mut self, idx: usize) {
        let mut visible = self.entries[idx]
            .children
            .iter()
            .filter(|&&child| !self.entries[child].hidden)
            .peekable();

        if visible.peek().is_none() {
            return;
        }

        let all_selected = visible.all(|&child| self.entries[child].selected);
        self.entries[idx].selected = all_selected;
    }

    /// Selected, visible files in tree order (directories before their
    /// children, siblings in listed order). Hidden subtrees are skipped.
    pub fn collect_selected(&self) -> Vec<String> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.collect_into(root, &mut out);
        }
        out
    }

    fn collect_into(&self, idx: usize, out: &mut Vec<String>) {
        let entry = &self.entries[idx];
        if entry.hidden {
            return;
        }
        match entry.kind {
            NodeKind::File => {
                if entry.selected {
                    out.push(entry.id.clone());
                }
            }
            NodeKind::Directory => {
                for &child in &entry.children {
                    self.collect_into(child, out);
                }
            }
        }
    }

    /// Count of visible files, the denominator shown next to a selection.
    pub fn visible_file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == NodeKind::File && !e.hidden)
            .count()
    }

    /// Owned, nested copy of the tree with derived flags.
    pub fn snapshot(&self) -> Vec<SelectableFileNode> {
        self.roots.iter().map(|&idx| self.snapshot_node(idx)).collect()
    }

    fn snapshot_node(&self, idx: usize) -> SelectableFileNode {
        let entry = &self.entries[idx];
        SelectableFileNode {
            id: entry.id.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
            selected: entry.selected,
            hidden: entry.hidden,
            children: entry
                .children
                .iter()
                .map(|&child| self.snapshot_node(child))
                .collect(),
        }
    }

    /// Ids of every descendant of `id` (excluding `id` itself), pre-order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.entries[idx].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(self.entries[current].id.clone());
            stack.extend(self.entries[current].children.iter().rev().copied());
        }
        out
    }
}
