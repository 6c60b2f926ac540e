//! SQLite implementation of [`NodeRepository`].
//!
//! [`SqliteRepository`] stores one row per node in the `tree_nodes` table
//! with a unique index on `path`. Caller payloads are stored as JSON TEXT via
//! serde_json. Prefix matches use `substr` rather than `LIKE` so alphabets
//! containing `%` or `_` stay safe, and every scan starts with a
//! `path >= ?` bound so SQLite can walk the path index.

use mptree_core::node::{NodeId, NodeRecord, TreeNode};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::error::StorageError;
use crate::traits::{DepthFilter, NodeRepository, PathRange};

const NODE_COLUMNS: &str = "id, path, depth, numchild, data_json";

/// Raw column tuple read from `tree_nodes`.
type RawNode = (i64, String, u32, u32, String);

/// SQLite-backed implementation of [`NodeRepository`].
///
/// Single statements are atomic on their own; [`NodeRepository::atomic`]
/// wraps a closure in a named SAVEPOINT so nested units roll back
/// independently.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteRepository { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteRepository { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn read_row(row: &Row<'_>) -> rusqlite::Result<RawNode> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn into_node(raw: RawNode) -> Result<TreeNode, StorageError> {
        let (id, path, depth, numchild, data_json) = raw;
        Ok(TreeNode {
            id: NodeId(id),
            path,
            depth,
            numchild,
            data: serde_json::from_str(&data_json)?,
        })
    }

    /// Runs a SELECT over `tree_nodes` and decodes every row.
    fn query_nodes(&self, sql: &str, values: Vec<SqlValue>) -> Result<Vec<TreeNode>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::read_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(Self::into_node(row?)?);
        }
        Ok(result)
    }

    fn id_exists(&self, id: i64) -> Result<bool, StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tree_nodes WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn path_exists(&self, path: &str) -> Result<bool, StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tree_nodes WHERE path = ?1)",
            params![path],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Fails with `NodeNotFound` when an UPDATE by id touched no row.
    fn expect_updated(changed: usize, id: NodeId) -> Result<(), StorageError> {
        if changed == 0 {
            return Err(StorageError::NodeNotFound(id.0));
        }
        Ok(())
    }
}

impl NodeRepository for SqliteRepository {
    fn get_by_path(&self, path: &str) -> Result<Option<TreeNode>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM tree_nodes WHERE path = ?1"),
                params![path],
                Self::read_row,
            )
            .optional()?;
        raw.map(Self::into_node).transpose()
    }

    fn get_by_id(&self, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM tree_nodes WHERE id = ?1"),
                params![id.0],
                Self::read_row,
            )
            .optional()?;
        raw.map(Self::into_node).transpose()
    }

    fn get_by_paths(&self, paths: &[String]) -> Result<Vec<TreeNode>, StorageError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; paths.len()].join(", ");
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM tree_nodes WHERE path IN ({placeholders}) ORDER BY path"
        );
        let values = paths.iter().cloned().map(SqlValue::Text).collect();
        self.query_nodes(&sql, values)
    }

    fn range_by_path_prefix(&self, range: &PathRange) -> Result<Vec<TreeNode>, StorageError> {
        let start = match range.low.as_deref() {
            Some(low) if low > range.prefix.as_str() => low,
            _ => range.prefix.as_str(),
        };
        let mut sql = format!("SELECT {NODE_COLUMNS} FROM tree_nodes WHERE path >= ?");
        let mut values = vec![SqlValue::Text(start.to_string())];

        if !range.prefix.is_empty() {
            sql.push_str(" AND substr(path, 1, ?) = ?");
            values.push(SqlValue::Integer(range.prefix.len() as i64));
            values.push(SqlValue::Text(range.prefix.clone()));
        }
        if let Some(high) = &range.high {
            sql.push_str(" AND path <= ?");
            values.push(SqlValue::Text(high.clone()));
        }
        match range.depth {
            DepthFilter::Any => {}
            DepthFilter::Exactly(depth) => {
                sql.push_str(" AND depth = ?");
                values.push(SqlValue::Integer(i64::from(depth)));
            }
            DepthFilter::GreaterThan(depth) => {
                sql.push_str(" AND depth > ?");
                values.push(SqlValue::Integer(i64::from(depth)));
            }
        }
        sql.push_str(" ORDER BY path");
        self.query_nodes(&sql, values)
    }

    fn insert(&mut self, record: NodeRecord) -> Result<TreeNode, StorageError> {
        if self.path_exists(&record.path)? {
            return Err(StorageError::DuplicatePath { path: record.path });
        }
        if let Some(id) = record.id {
            if self.id_exists(id.0)? {
                return Err(StorageError::DuplicateId(id.0));
            }
        }
        let data_json = serde_json::to_string(&record.data)?;
        self.conn.execute(
            "INSERT INTO tree_nodes (id, path, depth, numchild, data_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.map(|id| id.0),
                record.path,
                record.depth,
                record.numchild,
                data_json,
            ],
        )?;
        let id = NodeId(self.conn.last_insert_rowid());
        Ok(TreeNode {
            id,
            path: record.path,
            depth: record.depth,
            numchild: record.numchild,
            data: record.data,
        })
    }

    fn update_numchild(&mut self, path: &str, delta: i64) -> Result<(), StorageError> {
        self.conn.execute(
            "UPDATE tree_nodes SET numchild = MAX(numchild + ?1, 0) WHERE path = ?2",
            params![delta, path],
        )?;
        Ok(())
    }

    fn set_numchild(&mut self, id: NodeId, numchild: u32) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE tree_nodes SET numchild = ?1 WHERE id = ?2",
            params![numchild, id.0],
        )?;
        Self::expect_updated(changed, id)
    }

    fn set_depth(&mut self, id: NodeId, depth: u32) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE tree_nodes SET depth = ?1 WHERE id = ?2",
            params![depth, id.0],
        )?;
        Self::expect_updated(changed, id)
    }

    fn update_data(&mut self, id: NodeId, data: &Value) -> Result<(), StorageError> {
        let data_json = serde_json::to_string(data)?;
        let changed = self.conn.execute(
            "UPDATE tree_nodes SET data_json = ?1 WHERE id = ?2",
            params![data_json, id.0],
        )?;
        Self::expect_updated(changed, id)
    }

    fn rewrite_path_prefix(
        &mut self,
        old_prefix: &str,
        new_prefix: &str,
        steplen: usize,
    ) -> Result<usize, StorageError> {
        if old_prefix.is_empty() {
            return Err(StorageError::IntegrityError {
                reason: "refusing to rewrite the empty prefix".to_string(),
            });
        }
        if old_prefix == new_prefix {
            return Ok(0);
        }
        let old_len = old_prefix.len() as i64;

        // Any rewritten path that already belongs to a row outside the moved
        // subtree would violate the unique index halfway through the UPDATE.
        let collision: Option<String> = self
            .conn
            .query_row(
                "SELECT existing.path FROM tree_nodes AS moved \
                 JOIN tree_nodes AS existing \
                   ON existing.path = ?1 || substr(moved.path, ?2 + 1) \
                 WHERE moved.path >= ?3 AND substr(moved.path, 1, ?2) = ?3 \
                   AND substr(existing.path, 1, ?2) != ?3 \
                 LIMIT 1",
                params![new_prefix, old_len, old_prefix],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(path) = collision {
            return Err(StorageError::DuplicatePath { path });
        }

        let changed = if old_prefix.len() == new_prefix.len() || steplen == 0 {
            self.conn.execute(
                "UPDATE tree_nodes SET path = ?1 || substr(path, ?2 + 1) \
                 WHERE path >= ?3 AND substr(path, 1, ?2) = ?3",
                params![new_prefix, old_len, old_prefix],
            )?
        } else {
            self.conn.execute(
                "UPDATE tree_nodes \
                 SET path = ?1 || substr(path, ?2 + 1), \
                     depth = (length(?1) + length(path) - ?2) / ?4 \
                 WHERE path >= ?3 AND substr(path, 1, ?2) = ?3",
                params![new_prefix, old_len, old_prefix, steplen as i64],
            )?
        };
        tracing::debug!(old_prefix, new_prefix, rows = changed, "rewrote path prefix");
        Ok(changed)
    }

    fn delete_by_path_or_prefix(&mut self, path: &str) -> Result<usize, StorageError> {
        if path.is_empty() {
            return Err(StorageError::IntegrityError {
                reason: "refusing to delete the empty prefix".to_string(),
            });
        }
        let deleted = self.conn.execute(
            "DELETE FROM tree_nodes WHERE path >= ?1 AND substr(path, 1, ?2) = ?1",
            params![path, path.len() as i64],
        )?;
        Ok(deleted)
    }

    fn atomic<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<R, E>,
        E: From<StorageError>,
    {
        self.conn
            .execute_batch("SAVEPOINT mptree_atomic")
            .map_err(StorageError::from)?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("RELEASE mptree_atomic")
                    .map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO mptree_atomic; RELEASE mptree_atomic")
                {
                    tracing::error!(error = %rollback, "failed to roll back savepoint");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(path: &str, numchild: u32) -> NodeRecord {
        NodeRecord {
            id: None,
            path: path.to_string(),
            depth: (path.len() / 4) as u32,
            numchild,
            data: json!({"path": path}),
        }
    }

    fn seeded() -> SqliteRepository {
        let mut repo = SqliteRepository::in_memory().unwrap();
        for (path, numchild) in [
            ("0001", 2),
            ("00010001", 1),
            ("000100010001", 0),
            ("00010002", 0),
            ("0002", 0),
        ] {
            repo.insert(record(path, numchild)).unwrap();
        }
        repo
    }

    #[test]
    fn test_insert_and_get() {
        let repo = seeded();
        let node = repo.get_by_path("00010002").unwrap().unwrap();
        assert_eq!(node.depth, 2);
        assert_eq!(node.data, json!({"path": "00010002"}));
        let same = repo.get_by_id(node.id).unwrap().unwrap();
        assert_eq!(same, node);
        assert!(repo.get_by_path("0009").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicates_rejected() {
        let mut repo = seeded();
        assert!(matches!(
            repo.insert(record("0002", 0)),
            Err(StorageError::DuplicatePath { .. })
        ));
        let explicit = NodeRecord {
            id: Some(NodeId(1)),
            ..record("0003", 0)
        };
        assert!(matches!(
            repo.insert(explicit),
            Err(StorageError::DuplicateId(1))
        ));
    }

    #[test]
    fn test_range_and_depth_filters() {
        let repo = seeded();
        let descendants = repo
            .range_by_path_prefix(&PathRange::prefix("0001").depth(DepthFilter::GreaterThan(1)))
            .unwrap();
        let paths: Vec<&str> = descendants.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["00010001", "000100010001", "00010002"]);

        let all = repo.all_nodes().unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].path, "0001");
        assert_eq!(all[4].path, "0002");
    }

    #[test]
    fn test_rewrite_recomputes_depth() {
        let mut repo = seeded();
        assert_eq!(repo.rewrite_path_prefix("00010001", "0003", 4).unwrap(), 2);
        let moved = repo.get_by_path("00030001").unwrap().unwrap();
        assert_eq!(moved.depth, 2);
        assert_eq!(repo.get_by_path("0003").unwrap().unwrap().depth, 1);
    }

    #[test]
    fn test_rewrite_collision_leaves_rows() {
        let mut repo = seeded();
        let err = repo.rewrite_path_prefix("00010002", "0002", 4).unwrap_err();
        assert!(matches!(err, StorageError::DuplicatePath { .. }));
        assert!(repo.get_by_path("00010002").unwrap().is_some());
    }

    #[test]
    fn test_get_by_paths_batch() {
        let repo = seeded();
        let found = repo
            .get_by_paths(&["00010001".to_string(), "0001".to_string(), "0099".to_string()])
            .unwrap();
        let paths: Vec<&str> = found.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["0001", "00010001"]);
    }

    #[test]
    fn test_counters_and_payload_updates() {
        let mut repo = seeded();
        repo.update_numchild("0001", -5).unwrap();
        assert_eq!(repo.get_by_path("0001").unwrap().unwrap().numchild, 0);
        let id = repo.get_by_path("0002").unwrap().unwrap().id;
        repo.set_numchild(id, 3).unwrap();
        repo.set_depth(id, 9).unwrap();
        repo.update_data(id, &json!({"name": "renamed"})).unwrap();
        let node = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!((node.numchild, node.depth), (3, 9));
        assert_eq!(node.data["name"], "renamed");
        assert!(matches!(
            repo.set_depth(NodeId(999), 1),
            Err(StorageError::NodeNotFound(999))
        ));
    }

    #[test]
    fn test_delete_prefix() {
        let mut repo = seeded();
        assert_eq!(repo.delete_by_path_or_prefix("0001").unwrap(), 4);
        assert_eq!(repo.all_nodes().unwrap().len(), 1);
    }

    #[test]
    fn test_atomic_rollback_and_commit() {
        let mut repo = seeded();
        let failed: Result<(), StorageError> = repo.atomic(|repo| {
            repo.delete_by_path_or_prefix("0002")?;
            repo.insert(record("0001", 0))?;
            Ok(())
        });
        assert!(failed.is_err());
        assert!(repo.get_by_path("0002").unwrap().is_some());

        let committed: Result<usize, StorageError> =
            repo.atomic(|repo| repo.delete_by_path_or_prefix("0002"));
        assert_eq!(committed.unwrap(), 1);
        assert!(repo.get_by_path("0002").unwrap().is_none());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.db");
        let path = path.to_str().unwrap();
        {
            let mut repo = SqliteRepository::new(path).unwrap();
            repo.insert(record("0001", 0)).unwrap();
        }
        let repo = SqliteRepository::new(path).unwrap();
        assert!(repo.get_by_path("0001").unwrap().is_some());
    }
}
