//! SQLite-backed WIP state repository.
//!
//! # Responsibility
//! - Map the tree, focus pointer and archive log onto the `nodes`, `focus`
//!   and `archive` tables.
//! - Rebuild the in-memory tree without recursion.
//!
//! # Invariants
//! - A save runs in one `IMMEDIATE` transaction; readers see either the old
//!   or the new snapshot.
//! - `nodes` holds exactly one row with `parent_id IS NULL`, and every other
//!   row is reachable from it.
//! - Archive rows are only appended unless the stored log is longer than the
//!   in-memory one.

use crate::db::migrations::latest_version;
use crate::model::node::{normalize_name, ArchiveRecord, Node};
use crate::model::tree::TreeStore;
use crate::repo::{RepoError, RepoResult, StateRepository};
use log::{error, info};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::time::Instant;

struct NodeRow {
    node_id: i64,
    parent_id: Option<i64>,
    position: i64,
    name: String,
    notes: Option<String>,
    created_at: i64,
}

/// SQLite-backed state repository.
pub struct SqliteStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStateRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl StateRepository for SqliteStateRepository<'_> {
    fn load(&self) -> RepoResult<TreeStore> {
        let started_at = Instant::now();
        let rows = load_node_rows(self.conn)?;
        let focus = load_focus(self.conn)?;
        let archive = load_archive(self.conn)?;

        let root = if rows.is_empty() {
            if !focus.is_empty() {
                return Err(RepoError::CorruptState(
                    "focus path stored without a root node".to_string(),
                ));
            }
            Node::root()
        } else {
            assemble_tree(rows)?
        };

        info!(
            "event=state_load module=repo status=ok backend=sqlite duration_ms={} archive_len={}",
            started_at.elapsed().as_millis(),
            archive.len()
        );
        Ok(TreeStore::from_parts(root, focus, archive))
    }

    fn save(&self, store: &TreeStore) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = write_snapshot(self.conn, store);
        match &result {
            Ok(()) => info!(
                "event=state_save module=repo status=ok backend=sqlite duration_ms={} node_count={}",
                started_at.elapsed().as_millis(),
                store.node_count()
            ),
            Err(err) => error!(
                "event=state_save module=repo status=error backend=sqlite duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn write_snapshot(conn: &Connection, store: &TreeStore) -> RepoResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    tx.execute("DELETE FROM nodes;", [])?;
    let mut next_id: i64 = 1;
    let mut stack: Vec<(&Node, Option<i64>, i64)> = vec![(store.root(), None, 0)];
    while let Some((node, parent_id, position)) = stack.pop() {
        let node_id = next_id;
        next_id += 1;
        tx.execute(
            "INSERT INTO nodes (node_id, parent_id, position, name, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                node_id,
                parent_id,
                position,
                node.name,
                node.notes,
                node.created_at
            ],
        )?;
        for (index, child) in node.children.iter().enumerate().rev() {
            stack.push((child, Some(node_id), index as i64));
        }
    }

    tx.execute("DELETE FROM focus;", [])?;
    for (depth, name) in store.focus_path().iter().enumerate() {
        tx.execute(
            "INSERT INTO focus (depth, name) VALUES (?1, ?2);",
            params![depth as i64, name],
        )?;
    }

    let stored: i64 = tx.query_row("SELECT COUNT(*) FROM archive;", [], |row| row.get(0))?;
    let mut stored = stored as usize;
    if stored > store.archive().len() {
        tx.execute("DELETE FROM archive;", [])?;
        stored = 0;
    }
    for record in &store.archive()[stored..] {
        tx.execute(
            "INSERT INTO archive (name, notes, path, created_at, archived_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                record.name,
                record.notes,
                record.path,
                record.created_at,
                record.archived_at
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn load_node_rows(conn: &Connection) -> RepoResult<Vec<NodeRow>> {
    let mut stmt = conn.prepare(
        "SELECT node_id, parent_id, position, name, notes, created_at
         FROM nodes
         ORDER BY node_id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_node_row(row)?);
    }
    Ok(items)
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<NodeRow> {
    let name: String = row.get("name")?;
    if normalize_name(name.clone()).is_err() {
        return Err(RepoError::CorruptState(format!(
            "invalid node name `{name}` in nodes.name"
        )));
    }
    Ok(NodeRow {
        node_id: row.get("node_id")?,
        parent_id: row.get("parent_id")?,
        position: row.get("position")?,
        name,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

fn load_focus(conn: &Connection) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT depth, name FROM focus ORDER BY depth ASC;")?;
    let mut rows = stmt.query([])?;
    let mut focus = Vec::new();
    while let Some(row) = rows.next()? {
        let depth: i64 = row.get(0)?;
        if depth != focus.len() as i64 {
            return Err(RepoError::CorruptState(format!(
                "focus depth `{depth}` is not contiguous"
            )));
        }
        focus.push(row.get::<_, String>(1)?);
    }
    Ok(focus)
}

fn load_archive(conn: &Connection) -> RepoResult<Vec<ArchiveRecord>> {
    let mut stmt = conn.prepare(
        "SELECT name, notes, path, created_at, archived_at
         FROM archive
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(ArchiveRecord {
            name: row.get("name")?,
            notes: row.get("notes")?,
            path: row.get("path")?,
            created_at: row.get("created_at")?,
            archived_at: row.get("archived_at")?,
        });
    }
    Ok(records)
}

fn assemble_tree(rows: Vec<NodeRow>) -> RepoResult<Node> {
    let total = rows.len();
    let mut root_id = None;
    let mut children_of: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
    let mut pending: HashMap<i64, Node> = HashMap::with_capacity(total);

    for row in &rows {
        match row.parent_id {
            None if root_id.is_some() => {
                return Err(RepoError::CorruptState(
                    "more than one root node".to_string(),
                ));
            }
            None => root_id = Some(row.node_id),
            Some(parent_id) => children_of
                .entry(parent_id)
                .or_default()
                .push((row.position, row.node_id)),
        }
    }
    for row in rows {
        if row.parent_id == Some(row.node_id) {
            return Err(RepoError::CorruptState(format!(
                "node `{}` is its own parent",
                row.name
            )));
        }
        pending.insert(
            row.node_id,
            Node::with_timestamp(row.name, row.notes, row.created_at),
        );
    }
    for parent_id in children_of.keys() {
        if !pending.contains_key(parent_id) {
            return Err(RepoError::CorruptState(format!(
                "parent node `{parent_id}` does not exist"
            )));
        }
    }
    for children in children_of.values_mut() {
        children.sort();
    }

    let root_id = root_id
        .ok_or_else(|| RepoError::CorruptState("missing root node".to_string()))?;

    let mut preorder = Vec::with_capacity(total);
    let mut stack = vec![root_id];
    while let Some(node_id) = stack.pop() {
        preorder.push(node_id);
        if let Some(children) = children_of.get(&node_id) {
            stack.extend(children.iter().rev().map(|(_, child_id)| *child_id));
        }
    }
    if preorder.len() != total {
        return Err(RepoError::CorruptState(format!(
            "{} node rows are unreachable from root",
            total - preorder.len()
        )));
    }

    let mut built: HashMap<i64, Node> = HashMap::with_capacity(total);
    for node_id in preorder.into_iter().rev() {
        let mut node = take_node(&mut pending, node_id)?;
        if let Some(children) = children_of.get(&node_id) {
            for (_, child_id) in children {
                node.children.push(take_node(&mut built, *child_id)?);
            }
        }
        built.insert(node_id, node);
    }
    take_node(&mut built, root_id)
}

fn take_node(nodes: &mut HashMap<i64, Node>, node_id: i64) -> RepoResult<Node> {
    nodes
        .remove(&node_id)
        .ok_or_else(|| RepoError::CorruptState(format!("node `{node_id}` is referenced twice")))
}
