//! Opening the WIP state database.
//!
//! # Responsibility
//! - Open `wip.sqlite3` (or a private in-memory database for tests).
//! - Prepare the connection for snapshot saves and bring the schema current.
//!
//! # Invariants
//! - Returned connections enforce `nodes.parent_id` references.
//! - A second process holding the write lock is waited on, not failed fast.
//! - No state row is read before the schema is at `latest_version()`.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const WRITE_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Where the state database lives.
#[derive(Debug, Clone, Copy)]
enum StateDbLocation<'a> {
    File(&'a Path),
    Memory,
}

impl StateDbLocation<'_> {
    fn label(self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

/// Opens the state database file, creating it when absent.
///
/// # Errors
/// - `NotADatabase` when the file holds something other than SQLite.
/// - `UnsupportedSchemaVersion` when a newer build wrote the file.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_state_db(StateDbLocation::File(path.as_ref()))
}

/// Opens an empty in-memory state database with the schema applied.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_state_db(StateDbLocation::Memory)
}

fn open_state_db(location: StateDbLocation<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = location
        .connect()
        .map_err(Into::into)
        .and_then(|mut conn| prepare_state_db(&mut conn).map(|()| conn));

    match &result {
        Ok(conn) => info!(
            "event=state_db_open module=db status=ok location={} schema_version={} duration_ms={}",
            location.label(),
            conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
                .unwrap_or_default(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=state_db_open module=db status=error location={} duration_ms={} error={}",
            location.label(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn prepare_state_db(conn: &mut Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(WRITE_LOCK_WAIT)?;
    apply_migrations(conn)
}
