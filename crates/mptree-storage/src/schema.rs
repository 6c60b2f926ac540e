//! The `tree_nodes` table and how a connection is prepared for it.
//!
//! One row per node: the unique `path` carries the node's position, `depth`
//! and `numchild` are derived columns the reconciler can recompute, and the
//! caller payload is stored as JSON text in `data_json`. Range scans over a
//! path prefix use the unique index on `path`; depth-filtered listings use
//! `idx_tree_nodes_depth`.
//!
//! Schema versions are tracked in `user_version` by `rusqlite_migration`.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

const TREE_NODES_V1: &str = include_str!("migrations/001_tree_nodes.sql");

fn tree_migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(TREE_NODES_V1)])
}

/// Opens the tree database file at `path`, creating it and the
/// `tree_nodes` table if needed.
pub fn open_database(path: &str) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    prepare_tree_db(&mut conn)?;
    Ok(conn)
}

/// A private in-memory tree database, discarded with the connection.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    prepare_tree_db(&mut conn)?;
    Ok(conn)
}

fn prepare_tree_db(conn: &mut Connection) -> Result<(), StorageError> {
    // Prefix rewrites touch many rows per commit; WAL keeps readers unblocked.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    tree_migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))
}
