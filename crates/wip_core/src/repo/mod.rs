//! Persistence adapters for the WIP state.
//!
//! # Responsibility
//! - Define the load/save contract every storage backend implements.
//! - Keep storage encodings (SQL rows, JSON documents) behind that contract.
//!
//! # Invariants
//! - `load` on an empty location returns a fresh root-only store.
//! - `load` never returns a partially built tree; malformed data is
//!   reported as `RepoError::CorruptState`.
//! - `save` is all-or-nothing from the caller's perspective.

use crate::db::DbError;
use crate::model::tree::TreeStore;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod json_state_repo;
pub mod sqlite_state_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from state persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// File-system failure while reading or writing state.
    Io(std::io::Error),
    /// Persisted state exists but cannot be turned into a valid tree.
    CorruptState(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    /// Whether this error means the stored state itself is malformed.
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, Self::CorruptState(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "state i/o failed: {err}"),
            Self::CorruptState(message) => write!(f, "corrupt WIP state: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "state repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::CorruptState(_) => None,
            Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotADatabase => Self::CorruptState(value.to_string()),
            DbError::Sqlite(
                err @ (rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::IntegralValueOutOfRange(..)),
            ) => Self::CorruptState(err.to_string()),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::from(value).into()
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Storage backend for the full WIP snapshot.
pub trait StateRepository {
    /// Reconstructs the tree, focus pointer and archive log.
    fn load(&self) -> RepoResult<TreeStore>;
    /// Persists the complete snapshot atomically.
    fn save(&self, store: &TreeStore) -> RepoResult<()>;
}

impl<T: StateRepository + ?Sized> StateRepository for &T {
    fn load(&self) -> RepoResult<TreeStore> {
        (**self).load()
    }

    fn save(&self, store: &TreeStore) -> RepoResult<()> {
        (**self).save(store)
    }
}
