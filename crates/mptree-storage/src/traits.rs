//! The [`NodeRepository`] trait defining the storage contract for tree rows.
//!
//! The tree algorithms need very little from a store: point lookups by path
//! or id, range scans over paths in ascending order, counter updates, a bulk
//! prefix rewrite, a prefix delete, and a way to group several of those
//! calls into one all-or-nothing unit.
//!
//! All backends (InMemoryRepository, SqliteRepository) implement this trait,
//! ensuring they are fully swappable without changing the tree logic.

use mptree_core::node::{NodeId, NodeRecord, TreeNode};
use serde_json::Value;

use crate::error::StorageError;

/// Restriction on the `depth` column of a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFilter {
    #[default]
    Any,
    Exactly(u32),
    GreaterThan(u32),
}

impl DepthFilter {
    pub fn matches(self, depth: u32) -> bool {
        match self {
            DepthFilter::Any => true,
            DepthFilter::Exactly(d) => depth == d,
            DepthFilter::GreaterThan(d) => depth > d,
        }
    }
}

/// A scan over rows whose path starts with `prefix`, optionally bounded by
/// inclusive `low`/`high` paths and filtered by depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRange {
    pub prefix: String,
    pub low: Option<String>,
    pub high: Option<String>,
    pub depth: DepthFilter,
}

impl PathRange {
    /// Every row whose path starts with `prefix` (the empty prefix matches all).
    pub fn prefix(prefix: impl Into<String>) -> Self {
        PathRange {
            prefix: prefix.into(),
            ..PathRange::default()
        }
    }

    /// Restricts the scan to the inclusive interval `[low, high]`.
    pub fn between(mut self, low: impl Into<String>, high: impl Into<String>) -> Self {
        self.low = Some(low.into());
        self.high = Some(high.into());
        self
    }

    pub fn depth(mut self, depth: DepthFilter) -> Self {
        self.depth = depth;
        self
    }

    /// Whether `node` falls inside this range.
    pub fn contains(&self, node: &TreeNode) -> bool {
        node.path.starts_with(&self.prefix)
            && self.low.as_deref().map_or(true, |low| node.path.as_str() >= low)
            && self.high.as_deref().map_or(true, |high| node.path.as_str() <= high)
            && self.depth.matches(node.depth)
    }
}

/// The storage contract for materialized-path tree rows.
///
/// Each method is atomic on its own. The trait is synchronous; the tree
/// issues its calls in a fixed order and relies on [`NodeRepository::atomic`]
/// to make a sequence of them all-or-nothing.
pub trait NodeRepository {
    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Returns the row with exactly this path.
    fn get_by_path(&self, path: &str) -> Result<Option<TreeNode>, StorageError>;

    /// Returns the row with this id.
    fn get_by_id(&self, id: NodeId) -> Result<Option<TreeNode>, StorageError>;

    /// Returns the rows whose path is in `paths`, ordered by path.
    /// Paths with no row are skipped.
    fn get_by_paths(&self, paths: &[String]) -> Result<Vec<TreeNode>, StorageError>;

    /// Returns the rows inside `range`, ordered by path ascending.
    fn range_by_path_prefix(&self, range: &PathRange) -> Result<Vec<TreeNode>, StorageError>;

    /// Returns every row, ordered by path ascending.
    fn all_nodes(&self) -> Result<Vec<TreeNode>, StorageError> {
        self.range_by_path_prefix(&PathRange::prefix(""))
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Inserts a row, assigning an id unless the record carries one.
    ///
    /// Fails with [`StorageError::DuplicatePath`] or
    /// [`StorageError::DuplicateId`] without writing anything.
    fn insert(&mut self, record: NodeRecord) -> Result<TreeNode, StorageError>;

    /// Adds `delta` to the numchild of the row at `path`, clamping at zero.
    /// A missing row is not an error.
    fn update_numchild(&mut self, path: &str, delta: i64) -> Result<(), StorageError>;

    /// Overwrites the numchild column of one row.
    fn set_numchild(&mut self, id: NodeId, numchild: u32) -> Result<(), StorageError>;

    /// Overwrites the depth column of one row.
    fn set_depth(&mut self, id: NodeId, depth: u32) -> Result<(), StorageError>;

    /// Overwrites the caller payload of one row.
    fn update_data(&mut self, id: NodeId, data: &Value) -> Result<(), StorageError>;

    /// Replaces `old_prefix` with `new_prefix` on every row whose path starts
    /// with `old_prefix`, in one step. When the prefixes differ in length the
    /// depth of each rewritten row becomes `len(path) / steplen`.
    ///
    /// Returns the number of rewritten rows. Fails with
    /// [`StorageError::DuplicatePath`] without writing anything if a
    /// rewritten path would collide with an existing row.
    fn rewrite_path_prefix(
        &mut self,
        old_prefix: &str,
        new_prefix: &str,
        steplen: usize,
    ) -> Result<usize, StorageError>;

    /// Deletes the row at `path` and every row below it. Returns the number
    /// of deleted rows.
    fn delete_by_path_or_prefix(&mut self, path: &str) -> Result<usize, StorageError>;

    // -------------------------------------------------------------------
    // Transaction boundary
    // -------------------------------------------------------------------

    /// Runs `f` as one atomic unit: if it returns an error, every write it
    /// made through the repository is rolled back. Calls may nest.
    fn atomic<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<R, E>,
        E: From<StorageError>;
}
