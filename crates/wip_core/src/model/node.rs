//! WIP node and archive record model.
//!
//! # Responsibility
//! - Define the live tree node and the immutable archive snapshot.
//! - Validate node names before they enter the tree.
//!
//! # Invariants
//! - `name` is never blank and never contains the path separator.
//! - A node exclusively owns its `children`; the structure is a strict tree.
//! - Empty notes are represented as `None`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Separator used when joining node names into a path.
pub const PATH_SEPARATOR: char = '/';

/// Name given to the tree root on first run.
pub const ROOT_NAME: &str = "Root";

/// Validation failures for node names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    /// Name is empty after trimming.
    Blank,
    /// Name contains `/`, which would make the node unaddressable by path.
    ContainsSeparator(String),
}

impl Display for NameValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "node name must not be blank"),
            Self::ContainsSeparator(name) => {
                write!(f, "node name `{name}` must not contain `{PATH_SEPARATOR}`")
            }
        }
    }
}

impl Error for NameValidationError {}

/// One unit of focus in the WIP tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Unix epoch milliseconds, immutable after creation.
    pub created_at: i64,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Creates a childless node stamped with the current time.
    ///
    /// The name is trimmed and validated; notes are normalized so that empty
    /// text becomes `None`.
    pub fn new(
        name: impl Into<String>,
        notes: Option<String>,
    ) -> Result<Self, NameValidationError> {
        let name = normalize_name(name.into())?;
        Ok(Self::with_timestamp(name, notes, now_millis()))
    }

    /// Creates a node with a caller-provided timestamp and no validation.
    ///
    /// Used by storage loaders where data has already been checked.
    pub fn with_timestamp(name: impl Into<String>, notes: Option<String>, created_at: i64) -> Self {
        Self {
            name: name.into(),
            notes: normalize_notes(notes),
            created_at,
            children: Vec::new(),
        }
    }

    /// Creates the tree root.
    pub fn root() -> Self {
        Self::with_timestamp(ROOT_NAME, None, now_millis())
    }

    /// Returns the first direct child with `name`.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    /// Counts this node and every live descendant.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Immutable snapshot of a node removed from the live tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Path of the node at the moment it was detached.
    pub path: String,
    pub created_at: i64,
    pub archived_at: i64,
}

/// Trims a candidate node name and rejects unusable values.
pub fn normalize_name(value: String) -> Result<String, NameValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NameValidationError::Blank);
    }
    if trimmed.contains(PATH_SEPARATOR) {
        return Err(NameValidationError::ContainsSeparator(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Maps empty note text to `None`.
pub fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.filter(|value| !value.is_empty())
}

/// Joins root-relative names into a display path. Empty input yields `/`.
pub fn join_path<S: AsRef<str>>(names: &[S]) -> String {
    let mut path = String::new();
    for name in names {
        path.push(PATH_SEPARATOR);
        path.push_str(name.as_ref());
    }
    if path.is_empty() {
        path.push(PATH_SEPARATOR);
    }
    path
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{join_path, normalize_name, normalize_notes, NameValidationError, Node};

    #[test]
    fn normalize_name_trims_and_rejects_blank() {
        assert_eq!(normalize_name("  alpha ".to_string()).unwrap(), "alpha");
        assert_eq!(
            normalize_name("   ".to_string()).unwrap_err(),
            NameValidationError::Blank
        );
    }

    #[test]
    fn normalize_name_rejects_separator() {
        let err = normalize_name("a/b".to_string()).unwrap_err();
        assert!(matches!(err, NameValidationError::ContainsSeparator(name) if name == "a/b"));
    }

    #[test]
    fn empty_notes_collapse_to_none() {
        assert_eq!(normalize_notes(Some(String::new())), None);
        assert_eq!(normalize_notes(Some("x".to_string())), Some("x".to_string()));
        assert_eq!(Node::new("n", Some(String::new())).unwrap().notes, None);
    }

    #[test]
    fn join_path_renders_root_and_nested_paths() {
        assert_eq!(join_path::<&str>(&[]), "/");
        assert_eq!(join_path(&["project", "subtask"]), "/project/subtask");
    }

    #[test]
    fn subtree_len_counts_all_descendants() {
        let mut root = Node::root();
        let mut a = Node::new("a", None).unwrap();
        a.children.push(Node::new("b", None).unwrap());
        root.children.push(a);
        root.children.push(Node::new("c", None).unwrap());
        assert_eq!(root.subtree_len(), 4);
    }
}
