//! Navigation use-case service.
//!
//! # Responsibility
//! - Implement push/pop/up/down/switch/note as transitions over `TreeStore`.
//! - Flush the full snapshot through `StateRepository` after each change.
//! - Repair a stale focus pointer on open and report it once.
//!
//! # Invariants
//! - Transitions run on a scratch copy; in-memory state is replaced only
//!   after the save succeeded, so a failed flush leaves state untouched.
//! - Refusals never touch state or storage.
//! - `pop` archives children before their parent, using pre-detach paths.

use crate::editor::{EditorError, NoteEditor};
use crate::model::node::{now_millis, ArchiveRecord};
use crate::model::tree::{TreeError, TreeStore};
use crate::repo::{RepoError, StateRepository};
use crate::service::prompt::{Prompter, Reply};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::IntErrorKind;

/// Sentinel offered by `switch` for jumping back to the root.
pub const ROOT_TOKEN: &str = "root";

const CHOICE_PROMPT: &str = "Enter the number of your choice: ";
const SWITCH_PROMPT: &str = "Switch to: ";
const INVALID_CHOICE: &str = "Invalid choice. Please try again.";

/// Errors that abort a command.
#[derive(Debug)]
pub enum NavError {
    /// Tree invariant rejected the operation (e.g. invalid name).
    Tree(TreeError),
    /// Loading or saving state failed.
    Repo(RepoError),
    /// Interactive editor round trip failed.
    Editor(EditorError),
    /// Focused node has no parent in the live tree.
    MissingParent(String),
}

impl Display for NavError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Editor(err) => write!(f, "{err}"),
            Self::MissingParent(path) => write!(f, "parent node not found for `{path}`"),
        }
    }
}

impl Error for NavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Editor(err) => Some(err),
            Self::MissingParent(_) => None,
        }
    }
}

impl From<TreeError> for NavError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<RepoError> for NavError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<EditorError> for NavError {
    fn from(value: EditorError) -> Self {
        Self::Editor(value)
    }
}

pub type NavResult<T> = Result<T, NavError>;

/// Expected, user-facing reasons a command did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    RootDeletion,
    AlreadyAtRoot,
    NoChildren,
    Cancelled,
    NoPathSelected,
    /// `switch` path segment that did not resolve.
    NodeNotFound(String),
    /// `push` name already used by a sibling.
    DuplicateName(String),
}

impl Display for Refusal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootDeletion => write!(f, "Cannot delete root node"),
            Self::AlreadyAtRoot => write!(f, "Already at root node"),
            Self::NoChildren => write!(f, "No children nodes"),
            Self::Cancelled => write!(f, "...cancelled"),
            Self::NoPathSelected => write!(f, "No path selected"),
            Self::NodeNotFound(segment) => {
                write!(f, "Error: Could not find node `{segment}` in path")
            }
            Self::DuplicateName(name) => write!(f, "A WIP named `{name}` already exists here"),
        }
    }
}

/// Result of one navigation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and was persisted.
    Changed(String),
    /// Nothing happened.
    Refused(Refusal),
}

impl Outcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Changed(message) => write!(f, "{message}"),
            Self::Refused(refusal) => write!(f, "{refusal}"),
        }
    }
}

/// How `edit_note` obtains the new notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteEdit {
    /// Replace notes with the given text.
    Replace(String),
    /// Append the text on a new line.
    Append(String),
    /// Open the editor seeded with current notes.
    Interactive,
}

/// Navigation engine owning the state for one command.
pub struct NavigationService<R: StateRepository> {
    repo: R,
    store: TreeStore,
    repaired_segment: Option<String>,
}

impl<R: StateRepository> NavigationService<R> {
    /// Loads state and repairs a stale focus pointer.
    ///
    /// A repaired focus is persisted immediately so the warning is reported
    /// once.
    pub fn open(repo: R) -> NavResult<Self> {
        let mut store = repo.load()?;
        let repaired_segment = store.repair_focus();
        if let Some(segment_len) = repaired_segment.as_ref().map(String::len) {
            warn!(
                "event=focus_repair module=service status=warn missing_segment_len={} depth={}",
                segment_len,
                store.focus_path().len()
            );
            repo.save(&store)?;
        }
        Ok(Self {
            repo,
            store,
            repaired_segment,
        })
    }

    /// Warning text when `open` had to truncate the focus pointer.
    pub fn focus_warning(&self) -> Option<String> {
        self.repaired_segment.as_ref().map(|segment| {
            format!("Warning: Could not find node `{segment}` in path. Resetting to last valid node.")
        })
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// Creates a child of the focused node and focuses it.
    pub fn push(&mut self, name: &str, notes: Option<String>) -> NavResult<Outcome> {
        let mut next = self.store.clone();
        let parent = next.focus_path().to_vec();
        let created = match next.add_child(&parent, name, notes) {
            Ok(node) => node.name.clone(),
            Err(TreeError::DuplicateName { name, .. }) => {
                return Ok(Outcome::Refused(Refusal::DuplicateName(name)));
            }
            Err(err) => return Err(err.into()),
        };
        let mut focus = parent;
        focus.push(created.clone());
        next.set_focus(focus)?;
        self.commit(next)?;

        info!(
            "event=nav_push module=service status=ok depth={}",
            self.store.focus_path().len()
        );
        Ok(Outcome::Changed(format!("Created new WIP: {created}")))
    }

    /// Archives the focused subtree and focuses its parent.
    pub fn pop(&mut self) -> NavResult<Outcome> {
        if self.store.is_at_root() {
            return Ok(Outcome::Refused(Refusal::RootDeletion));
        }

        let mut next = self.store.clone();
        let path = next.focus_path().to_vec();
        if TreeStore::find_parent(next.root(), next.current_node()).is_none() {
            return Err(NavError::MissingParent(next.path_string()));
        }
        let detached = next.detach(&path)?;
        let archived = next.archive_subtree(&detached, &path, now_millis());
        next.focus_parent();
        self.commit(next)?;

        info!(
            "event=nav_pop module=service status=ok archived={} depth={}",
            archived,
            self.store.focus_path().len()
        );
        Ok(Outcome::Changed(format!(
            "Deleted node and moved to parent: {}",
            self.current_info()
        )))
    }

    /// Moves focus to the parent without deleting anything.
    pub fn up(&mut self) -> NavResult<Outcome> {
        let mut next = self.store.clone();
        if !next.focus_parent() {
            return Ok(Outcome::Refused(Refusal::AlreadyAtRoot));
        }
        self.commit(next)?;
        Ok(Outcome::Changed(self.current_info()))
    }

    /// Moves focus to a child, prompting when there is more than one.
    pub fn down(&mut self, prompter: &mut dyn Prompter) -> NavResult<Outcome> {
        let children: Vec<String> = self
            .store
            .current_children_by_name()
            .into_iter()
            .map(|node| node.name.clone())
            .collect();

        let chosen = match children.len() {
            0 => return Ok(Outcome::Refused(Refusal::NoChildren)),
            1 => 0,
            _ => match select_child(&children, prompter) {
                Some(index) => index,
                None => return Ok(Outcome::Refused(Refusal::Cancelled)),
            },
        };

        let mut next = self.store.clone();
        let mut focus = next.focus_path().to_vec();
        focus.push(children[chosen].clone());
        next.set_focus(focus)?;
        self.commit(next)?;
        Ok(Outcome::Changed(self.current_info()))
    }

    /// Jumps to any live node chosen by path.
    pub fn switch(&mut self, prompter: &mut dyn Prompter) -> NavResult<Outcome> {
        let mut candidates = vec![ROOT_TOKEN.to_string()];
        candidates.extend(self.store.all_paths());

        let selected = match prompter.pick(SWITCH_PROMPT, &candidates) {
            Reply::Answer(text) => text,
            Reply::Cancelled => return Ok(Outcome::Refused(Refusal::Cancelled)),
        };
        let selected = selected.trim();
        if selected.is_empty() {
            return Ok(Outcome::Refused(Refusal::NoPathSelected));
        }

        let trimmed = selected.trim_matches('/');
        let names: Vec<String> = if selected.eq_ignore_ascii_case(ROOT_TOKEN) || trimmed.is_empty()
        {
            Vec::new()
        } else {
            trimmed.split('/').map(str::to_string).collect()
        };

        let mut next = self.store.clone();
        match next.set_focus(names) {
            Ok(()) => {}
            Err(TreeError::NodeNotFound(segment)) => {
                return Ok(Outcome::Refused(Refusal::NodeNotFound(segment)));
            }
            Err(err) => return Err(err.into()),
        }
        self.commit(next)?;
        Ok(Outcome::Changed(format!(
            "Switched to: {}",
            self.current_info()
        )))
    }

    /// Updates the notes of the focused node.
    ///
    /// `editor` is only consulted for `NoteEdit::Interactive`; its output is
    /// trimmed and stored even when unchanged.
    pub fn edit_note(&mut self, edit: NoteEdit, editor: &mut dyn NoteEditor) -> NavResult<Outcome> {
        let current = self.store.current_node().notes.clone();
        let notes = match edit {
            NoteEdit::Replace(text) => text,
            NoteEdit::Append(text) => {
                format!("{}\n{}", current.unwrap_or_default(), text)
                    .trim()
                    .to_string()
            }
            NoteEdit::Interactive => editor
                .edit(current.as_deref().unwrap_or(""))?
                .trim()
                .to_string(),
        };

        let mut next = self.store.clone();
        next.set_current_notes(Some(notes));
        self.commit(next)?;
        Ok(Outcome::Changed("Note updated successfully".to_string()))
    }

    /// Name, path and notes of the focused node.
    pub fn current_info(&self) -> String {
        let node = self.store.current_node();
        format!(
            "Current WIP: {}\nPath: {}\nNotes: {}",
            node.name,
            self.store.path_string(),
            node.notes.as_deref().unwrap_or("None")
        )
    }

    pub fn path(&self) -> String {
        self.store.path_string()
    }

    /// Archive records, most recently archived first.
    pub fn archive_log(&self, limit: Option<usize>) -> Vec<&ArchiveRecord> {
        let records = self.store.archive().iter().rev();
        match limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        }
    }

    fn commit(&mut self, next: TreeStore) -> NavResult<()> {
        self.repo.save(&next)?;
        self.store = next;
        Ok(())
    }
}

/// Prompts until the user enters an index in `1..=children.len()`.
///
/// Returns `None` when the user cancels.
fn select_child(children: &[String], prompter: &mut dyn Prompter) -> Option<usize> {
    prompter.show("Select a child node:");
    for (index, name) in children.iter().enumerate() {
        prompter.show(&format!("{}. {}", index + 1, name));
    }

    loop {
        let answer = match prompter.ask(CHOICE_PROMPT) {
            Reply::Answer(text) => text,
            Reply::Cancelled => return None,
        };
        match answer.trim().parse::<i64>() {
            Ok(choice) if choice >= 1 && choice <= children.len() as i64 => {
                return Some(choice as usize - 1);
            }
            Ok(_) => prompter.show(INVALID_CHOICE),
            Err(err)
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                prompter.show(INVALID_CHOICE)
            }
            Err(_) => prompter.show("Invalid input. Please enter a number."),
        }
    }
}
