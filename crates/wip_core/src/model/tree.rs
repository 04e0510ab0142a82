//! In-memory WIP tree store.
//!
//! # Responsibility
//! - Own the node tree, the focus pointer and the archive log.
//! - Provide pure tree operations with no I/O.
//!
//! # Invariants
//! - The root is never detached or archived.
//! - Sibling names are unique for nodes created through `add_child`.
//! - The archive log is append-only.
//! - `current_node` never panics: a stale focus tail resolves to its deepest
//!   live ancestor until `repair_focus` truncates it.

use crate::model::node::{join_path, normalize_notes, ArchiveRecord, NameValidationError, Node};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by tree store operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors from tree store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Candidate node name failed validation.
    InvalidName(NameValidationError),
    /// A sibling with the same name already exists under `parent_path`.
    DuplicateName { parent_path: String, name: String },
    /// Path does not resolve; carries the first segment that was not found.
    NodeNotFound(String),
    /// Attempt to detach or archive the root.
    RootDeletion,
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::DuplicateName { parent_path, name } => {
                write!(f, "node `{name}` already exists under `{parent_path}`")
            }
            Self::NodeNotFound(segment) => write!(f, "could not find node `{segment}`"),
            Self::RootDeletion => write!(f, "cannot delete root node"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NameValidationError> for TreeError {
    fn from(value: NameValidationError) -> Self {
        Self::InvalidName(value)
    }
}

/// Tree, focus pointer and archive log for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStore {
    root: Node,
    focus: Vec<String>,
    archive: Vec<ArchiveRecord>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    /// Creates a fresh store: root only, focus on root, empty archive.
    pub fn new() -> Self {
        Self::from_parts(Node::root(), Vec::new(), Vec::new())
    }

    /// Assembles a store from persisted parts without validating `focus`.
    ///
    /// Callers loading external data should follow up with `repair_focus`.
    pub fn from_parts(root: Node, focus: Vec<String>, archive: Vec<ArchiveRecord>) -> Self {
        Self {
            root,
            focus,
            archive,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Focus pointer as root-relative names. Empty means root.
    pub fn focus_path(&self) -> &[String] {
        &self.focus
    }

    /// Focus pointer rendered as `/a/b`, or `/` at root.
    pub fn path_string(&self) -> String {
        join_path(&self.focus)
    }

    pub fn is_at_root(&self) -> bool {
        self.focus.is_empty()
    }

    /// Archive log in append order.
    pub fn archive(&self) -> &[ArchiveRecord] {
        &self.archive
    }

    /// Walks from root following `names`; `None` at the first missing name.
    pub fn resolve_path<S: AsRef<str>>(&self, names: &[S]) -> Option<&Node> {
        let mut node = &self.root;
        for name in names {
            node = node.child(name.as_ref())?;
        }
        Some(node)
    }

    fn resolve_path_mut<S: AsRef<str>>(&mut self, names: &[S]) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for name in names {
            node = node.child_mut(name.as_ref())?;
        }
        Some(node)
    }

    /// Returns the focused node.
    pub fn current_node(&self) -> &Node {
        self.deepest_resolvable().0
    }

    /// Truncates the focus pointer to its deepest resolvable ancestor.
    ///
    /// Returns the first segment that failed to resolve, or `None` when the
    /// focus was already valid.
    pub fn repair_focus(&mut self) -> Option<String> {
        let (_, depth) = self.deepest_resolvable();
        if depth == self.focus.len() {
            return None;
        }
        let missing = self.focus[depth].clone();
        self.focus.truncate(depth);
        Some(missing)
    }

    /// Moves focus to `names` if every segment resolves.
    ///
    /// # Errors
    /// - `NodeNotFound` with the first unresolvable segment; focus unchanged.
    pub fn set_focus(&mut self, names: Vec<String>) -> TreeResult<()> {
        let mut node = &self.root;
        for name in &names {
            node = node
                .child(name)
                .ok_or_else(|| TreeError::NodeNotFound(name.clone()))?;
        }
        self.focus = names;
        Ok(())
    }

    /// Drops the last focus segment. Returns `false` when already at root.
    pub fn focus_parent(&mut self) -> bool {
        self.focus.pop().is_some()
    }

    /// Appends a new child under `parent`. Focus is unchanged.
    ///
    /// # Errors
    /// - `InvalidName` when the name is blank or contains `/`.
    /// - `NodeNotFound` when `parent` does not resolve.
    /// - `DuplicateName` when `parent` already has a child with that name.
    pub fn add_child(
        &mut self,
        parent: &[String],
        name: &str,
        notes: Option<String>,
    ) -> TreeResult<&Node> {
        let node = Node::new(name, notes)?;
        let parent_node = self
            .resolve_path_mut(parent)
            .ok_or_else(|| TreeError::NodeNotFound(join_path(parent)))?;
        if parent_node.child(&node.name).is_some() {
            return Err(TreeError::DuplicateName {
                parent_path: join_path(parent),
                name: node.name,
            });
        }
        let index = parent_node.children.len();
        parent_node.children.push(node);
        Ok(&parent_node.children[index])
    }

    /// Removes the node at `path` from its parent and returns it.
    ///
    /// # Errors
    /// - `RootDeletion` for the root path.
    /// - `NodeNotFound` when `path` does not resolve.
    pub fn detach(&mut self, path: &[String]) -> TreeResult<Node> {
        let Some((name, parent_path)) = path.split_last() else {
            return Err(TreeError::RootDeletion);
        };
        let parent = self
            .resolve_path_mut(parent_path)
            .ok_or_else(|| TreeError::NodeNotFound(join_path(parent_path)))?;
        let index = parent
            .children
            .iter()
            .position(|child| &child.name == name)
            .ok_or_else(|| TreeError::NodeNotFound(name.clone()))?;
        Ok(parent.children.remove(index))
    }

    /// Finds the direct parent of `target` below `root` by node identity.
    pub fn find_parent<'a>(root: &'a Node, target: &Node) -> Option<&'a Node> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node
                .children
                .iter()
                .any(|child| std::ptr::eq(child, target))
            {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Replaces the notes of the focused node.
    pub fn set_current_notes(&mut self, notes: Option<String>) {
        let depth = self.deepest_resolvable().1;
        let focus = self.focus[..depth].to_vec();
        if let Some(node) = self.resolve_path_mut(&focus) {
            node.notes = normalize_notes(notes);
        }
    }

    /// Appends archive records for `node` and its subtree, children first.
    ///
    /// `path` is the node's path before detachment. Every record shares
    /// `archived_at`. Returns the number of records appended.
    pub fn archive_subtree(&mut self, node: &Node, path: &[String], archived_at: i64) -> usize {
        let before = self.archive.len();
        let mut stack: Vec<(&Node, Vec<String>, bool)> = vec![(node, path.to_vec(), false)];
        while let Some((current, current_path, expanded)) = stack.pop() {
            if expanded {
                self.archive.push(ArchiveRecord {
                    name: current.name.clone(),
                    notes: current.notes.clone(),
                    path: join_path(&current_path),
                    created_at: current.created_at,
                    archived_at,
                });
                continue;
            }
            stack.push((current, current_path.clone(), true));
            for child in current.children.iter().rev() {
                let mut child_path = current_path.clone();
                child_path.push(child.name.clone());
                stack.push((child, child_path, false));
            }
        }
        self.archive.len() - before
    }

    /// Live node paths in preorder, root excluded.
    pub fn all_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        let mut stack: Vec<(&Node, Vec<&str>)> = self
            .root
            .children
            .iter()
            .rev()
            .map(|child| (child, vec![child.name.as_str()]))
            .collect();
        while let Some((node, names)) = stack.pop() {
            paths.push(join_path(&names));
            for child in node.children.iter().rev() {
                let mut child_names = names.clone();
                child_names.push(child.name.as_str());
                stack.push((child, child_names));
            }
        }
        paths
    }

    /// Number of live nodes including root.
    pub fn node_count(&self) -> usize {
        self.root.subtree_len()
    }

    /// Children of the focused node ordered by name.
    pub fn current_children_by_name(&self) -> Vec<&Node> {
        let mut children: Vec<&Node> = self.current_node().children.iter().collect();
        children.sort_by(|left, right| left.name.cmp(&right.name));
        children
    }

    fn deepest_resolvable(&self) -> (&Node, usize) {
        let mut node = &self.root;
        for (depth, name) in self.focus.iter().enumerate() {
            match node.child(name) {
                Some(child) => node = child,
                None => return (node, depth),
            }
        }
        (node, self.focus.len())
    }
}
