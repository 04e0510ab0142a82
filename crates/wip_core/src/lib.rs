//! Core domain logic for the WIP tracker.
//! This crate is the single source of truth for tree and focus invariants.

pub mod config;
pub mod db;
pub mod editor;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ConfigOverrides, StorageBackend, WipConfig};
pub use editor::{EditorError, ExternalEditor, NoteEditor};
pub use logging::{default_log_level, init_logging};
pub use model::node::{ArchiveRecord, NameValidationError, Node};
pub use model::tree::{TreeError, TreeResult, TreeStore};
pub use repo::json_state_repo::JsonStateRepository;
pub use repo::sqlite_state_repo::SqliteStateRepository;
pub use repo::{RepoError, RepoResult, StateRepository};
pub use service::nav_service::{
    NavError, NavResult, NavigationService, NoteEdit, Outcome, Refusal, ROOT_TOKEN,
};
pub use service::prompt::{Prompter, Reply};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
