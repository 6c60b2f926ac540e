//! Tree node records.
//!
//! A [`TreeNode`] is one stored row: an identity assigned by the store, its
//! materialized path, the cached `depth` and `numchild` columns, and the
//! caller's own fields as a JSON object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-assigned node identifier.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub path: String,
    /// Number of segments in `path`.
    pub depth: u32,
    /// Number of direct children.
    pub numchild: u32,
    /// Caller-defined fields.
    #[serde(default)]
    pub data: Value,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.depth == 1
    }

    pub fn is_leaf(&self) -> bool {
        self.numchild == 0
    }

    /// True if `self` lies strictly below `other`.
    pub fn is_descendant_of(&self, other: &TreeNode) -> bool {
        self.depth > other.depth && self.path.starts_with(&other.path)
    }

    /// True if `self` is a direct child of `parent`.
    pub fn is_child_of(&self, parent: &TreeNode) -> bool {
        self.depth == parent.depth + 1 && self.path.starts_with(&parent.path)
    }

    /// Looks up a caller field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Caller-supplied input for the add operations.
///
/// `id` is normally left empty so the store assigns one; bulk loads that
/// preserve identities set it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub data: Value,
}

impl NewNode {
    pub fn new(data: Value) -> Self {
        NewNode { id: None, data }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }
}

impl From<Value> for NewNode {
    fn from(data: Value) -> Self {
        NewNode::new(data)
    }
}

/// A fully placed row handed to the repository for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: Option<NodeId>,
    pub path: String,
    pub depth: u32,
    pub numchild: u32,
    pub data: Value,
}
