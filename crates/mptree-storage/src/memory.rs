//! In-memory implementation of [`NodeRepository`].
//!
//! [`InMemoryRepository`] is a first-class backend for tests, ephemeral
//! trees, and anywhere persistence isn't needed. Rows live in a `BTreeMap`
//! keyed by path, so range scans are ordered exactly like an index on the
//! path column.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use mptree_core::node::{NodeId, NodeRecord, TreeNode};
use serde_json::Value;

use crate::error::StorageError;
use crate::traits::{NodeRepository, PathRange};

#[derive(Debug, Clone)]
struct StoredTree {
    /// Rows indexed by path
    by_path: BTreeMap<String, TreeNode>,
    /// Secondary index from id to path
    paths: HashMap<NodeId, String>,
    /// Next id to assign
    next_id: i64,
}

/// One reversible write, recorded while an atomic unit is open.
#[derive(Debug, Clone)]
enum Undo {
    /// A row was created at this path.
    Inserted(String),
    /// This row was removed.
    Removed(TreeNode),
    /// This row was overwritten in place; its path is unchanged.
    Updated(TreeNode),
    /// The id counter before an insert.
    NextId(i64),
}

/// In-memory implementation of [`NodeRepository`].
///
/// Inside [`NodeRepository::atomic`] every write appends its inverse to a
/// journal. A failed unit replays the journal backwards down to the mark it
/// started at, so rollback costs only the rows that unit touched.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    state: StoredTree,
    journal: Vec<Undo>,
    /// Number of atomic units currently open.
    open_units: usize,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        InMemoryRepository {
            state: StoredTree {
                by_path: BTreeMap::new(),
                paths: HashMap::new(),
                next_id: 1,
            },
            journal: Vec::new(),
            open_units: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.state.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.by_path.is_empty()
    }

    /// Paths of every row starting with `prefix`, ascending.
    fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .by_path
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(path, _)| path)
            .take_while(|path| path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn record(&mut self, undo: Undo) {
        if self.open_units > 0 {
            self.journal.push(undo);
        }
    }

    /// Applies `f` to the row with this id, journaling its previous state.
    fn update_row(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut TreeNode),
    ) -> Result<(), StorageError> {
        let node = self.get_mut_by_id(id)?;
        let before = node.clone();
        f(node);
        self.record(Undo::Updated(before));
        Ok(())
    }

    /// Adds a row to both indexes and journals it.
    fn put_row(&mut self, node: TreeNode) {
        self.state.paths.insert(node.id, node.path.clone());
        self.record(Undo::Inserted(node.path.clone()));
        self.state.by_path.insert(node.path.clone(), node);
    }

    /// Removes the row at `path` from both indexes and journals it.
    fn take_row(&mut self, path: &str) -> Option<TreeNode> {
        let node = self.state.by_path.remove(path)?;
        if self.state.paths.get(&node.id).map(String::as_str) == Some(path) {
            self.state.paths.remove(&node.id);
        }
        self.record(Undo::Removed(node.clone()));
        Some(node)
    }

    /// Reverts journaled writes until the journal is back to `mark` entries.
    fn rollback_to(&mut self, mark: usize) {
        while self.journal.len() > mark {
            let Some(undo) = self.journal.pop() else {
                break;
            };
            match undo {
                Undo::Inserted(path) => {
                    if let Some(node) = self.state.by_path.remove(&path) {
                        if self.state.paths.get(&node.id) == Some(&path) {
                            self.state.paths.remove(&node.id);
                        }
                    }
                }
                Undo::Removed(node) => {
                    self.state.paths.insert(node.id, node.path.clone());
                    self.state.by_path.insert(node.path.clone(), node);
                }
                Undo::Updated(node) => {
                    self.state.by_path.insert(node.path.clone(), node);
                }
                Undo::NextId(next_id) => self.state.next_id = next_id,
            }
        }
    }

    fn get_mut_by_id(&mut self, id: NodeId) -> Result<&mut TreeNode, StorageError> {
        let path = self
            .state
            .paths
            .get(&id)
            .ok_or(StorageError::NodeNotFound(id.0))?;
        self.state
            .by_path
            .get_mut(path)
            .ok_or_else(|| StorageError::IntegrityError {
                reason: format!("id index points at missing path '{path}'"),
            })
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRepository for InMemoryRepository {
    fn get_by_path(&self, path: &str) -> Result<Option<TreeNode>, StorageError> {
        Ok(self.state.by_path.get(path).cloned())
    }

    fn get_by_id(&self, id: NodeId) -> Result<Option<TreeNode>, StorageError> {
        Ok(self
            .state
            .paths
            .get(&id)
            .and_then(|path| self.state.by_path.get(path))
            .cloned())
    }

    fn get_by_paths(&self, paths: &[String]) -> Result<Vec<TreeNode>, StorageError> {
        let mut nodes: Vec<TreeNode> = paths
            .iter()
            .filter_map(|path| self.state.by_path.get(path).cloned())
            .collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        nodes.dedup_by(|a, b| a.path == b.path);
        Ok(nodes)
    }

    fn range_by_path_prefix(&self, range: &PathRange) -> Result<Vec<TreeNode>, StorageError> {
        let start = match range.low.as_deref() {
            Some(low) if low > range.prefix.as_str() => low,
            _ => range.prefix.as_str(),
        };
        Ok(self
            .state
            .by_path
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .map(|(_, node)| node)
            .take_while(|node| {
                node.path.starts_with(&range.prefix)
                    && range
                        .high
                        .as_deref()
                        .map_or(true, |high| node.path.as_str() <= high)
            })
            .filter(|node| range.depth.matches(node.depth))
            .cloned()
            .collect())
    }

    fn insert(&mut self, record: NodeRecord) -> Result<TreeNode, StorageError> {
        if self.state.by_path.contains_key(&record.path) {
            return Err(StorageError::DuplicatePath { path: record.path });
        }
        let id = record.id.unwrap_or(NodeId(self.state.next_id));
        if self.state.paths.contains_key(&id) {
            return Err(StorageError::DuplicateId(id.0));
        }
        self.record(Undo::NextId(self.state.next_id));
        self.state.next_id = self.state.next_id.max(id.0.saturating_add(1));

        let node = TreeNode {
            id,
            path: record.path,
            depth: record.depth,
            numchild: record.numchild,
            data: record.data,
        };
        self.put_row(node.clone());
        Ok(node)
    }

    fn update_numchild(&mut self, path: &str, delta: i64) -> Result<(), StorageError> {
        if let Some(node) = self.state.by_path.get_mut(path) {
            let before = node.clone();
            let updated = (i64::from(node.numchild) + delta).clamp(0, i64::from(u32::MAX));
            node.numchild = updated as u32;
            self.record(Undo::Updated(before));
        }
        Ok(())
    }

    fn set_numchild(&mut self, id: NodeId, numchild: u32) -> Result<(), StorageError> {
        self.update_row(id, |node| node.numchild = numchild)
    }

    fn set_depth(&mut self, id: NodeId, depth: u32) -> Result<(), StorageError> {
        self.update_row(id, |node| node.depth = depth)
    }

    fn update_data(&mut self, id: NodeId, data: &Value) -> Result<(), StorageError> {
        self.update_row(id, |node| node.data = data.clone())
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
        let moved = self.paths_with_prefix(old_prefix);
        let rewritten: Vec<String> = moved
            .iter()
            .map(|path| format!("{new_prefix}{}", &path[old_prefix.len()..]))
            .collect();

        // Reject collisions with rows outside the moved set before touching anything.
        for path in &rewritten {
            if self.state.by_path.contains_key(path) && !path.starts_with(old_prefix) {
                return Err(StorageError::DuplicatePath { path: path.clone() });
            }
        }

        let recompute_depth = old_prefix.len() != new_prefix.len();
        let mut nodes: Vec<TreeNode> = moved
            .iter()
            .filter_map(|path| self.take_row(path))
            .collect();
        for (node, path) in nodes.iter_mut().zip(rewritten) {
            node.path = path;
            if recompute_depth && steplen > 0 {
                node.depth = (node.path.len() / steplen) as u32;
            }
        }
        let count = nodes.len();
        for node in nodes {
            self.put_row(node);
        }
        Ok(count)
    }

    fn delete_by_path_or_prefix(&mut self, path: &str) -> Result<usize, StorageError> {
        if path.is_empty() {
            return Err(StorageError::IntegrityError {
                reason: "refusing to delete the empty prefix".to_string(),
            });
        }
        let doomed = self.paths_with_prefix(path);
        for p in &doomed {
            self.take_row(p);
        }
        Ok(doomed.len())
    }

    fn atomic<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<R, E>,
        E: From<StorageError>,
    {
        let mark = self.journal.len();
        self.open_units += 1;
        let result = f(self);
        self.open_units -= 1;
        match result {
            Ok(value) => {
                if self.open_units == 0 {
                    self.journal.clear();
                }
                Ok(value)
            }
            Err(err) => {
                self.rollback_to(mark);
                Err(err)
            }
        }
    }
}
