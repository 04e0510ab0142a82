//! JSON document WIP state repository.
//!
//! # Responsibility
//! - Persist the whole snapshot as one pretty-printed JSON document.
//! - Replace the document atomically via write-to-temp then rename.
//!
//! # Invariants
//! - The temp file lives in the target directory so `persist` is a rename
//!   on the same file system.
//! - A missing document loads as a fresh store.
//! - Any depth that saves also loads: parsing has no nesting limit and grows
//!   the stack on demand.

use crate::model::node::{normalize_name, ArchiveRecord, Node};
use crate::model::tree::TreeStore;
use crate::repo::{RepoError, RepoResult, StateRepository};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the state document inside the state directory.
pub const STATE_DOCUMENT_NAME: &str = "state.json";

#[derive(Deserialize)]
struct StateDocument {
    root: Node,
    #[serde(default)]
    current_path: Vec<String>,
    #[serde(default)]
    archive: Vec<ArchiveRecord>,
}

#[derive(Serialize)]
struct StateDocumentRef<'a> {
    root: &'a Node,
    current_path: &'a [String],
    archive: &'a [ArchiveRecord],
}

/// JSON-document-backed state repository.
pub struct JsonStateRepository {
    path: PathBuf,
}

impl JsonStateRepository {
    /// Creates a repository for the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateRepository for JsonStateRepository {
    fn load(&self) -> RepoResult<TreeStore> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("event=state_load module=repo status=fresh backend=json");
                return Ok(TreeStore::new());
            }
            Err(err) => return Err(err.into()),
        };

        let document = parse_document(&text)
            .map_err(|err| RepoError::CorruptState(format!("unparsable state document: {err}")))?;
        ensure_valid_names(&document.root)?;

        info!(
            "event=state_load module=repo status=ok backend=json archive_len={}",
            document.archive.len()
        );
        Ok(TreeStore::from_parts(
            document.root,
            document.current_path,
            document.archive,
        ))
    }

    fn save(&self, store: &TreeStore) -> RepoResult<()> {
        let result = self.write_document(store);
        match &result {
            Ok(()) => info!(
                "event=state_save module=repo status=ok backend=json node_count={}",
                store.node_count()
            ),
            Err(err) => error!(
                "event=state_save module=repo status=error backend=json error={}",
                err
            ),
        }
        result
    }
}

impl JsonStateRepository {
    fn write_document(&self, store: &TreeStore) -> RepoResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let document = StateDocumentRef {
            root: store.root(),
            current_path: store.focus_path(),
            archive: store.archive(),
        };
        let encoded = serde_json::to_vec_pretty(&document)
            .map_err(|err| RepoError::Io(std::io::Error::other(err)))?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&encoded)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| RepoError::Io(err.error))?;
        Ok(())
    }
}

/// Each tree level nests two JSON values; parsing is unbounded so any tree
/// `save` wrote can be read back.
fn parse_document(text: &str) -> serde_json::Result<StateDocument> {
    let mut deserializer = Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let document = StateDocument::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(document)
}

fn ensure_valid_names(root: &Node) -> RepoResult<()> {
    let mut stack: Vec<&Node> = root.children.iter().collect();
    while let Some(node) = stack.pop() {
        if normalize_name(node.name.clone()).is_err() {
            return Err(RepoError::CorruptState(format!(
                "invalid node name `{}` in state document",
                node.name
            )));
        }
        stack.extend(node.children.iter());
    }
    Ok(())
}
