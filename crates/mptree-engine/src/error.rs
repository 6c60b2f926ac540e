//! Error types for tree operations.
//!
//! [`TreeError`] is what every public [`Tree`](crate::Tree) operation returns.
//! Path overflow is reported through a single variant no matter whether the
//! codec or the mutation logic detected it; storage failures pass through
//! unchanged.

use mptree_core::node::NodeId;
use mptree_core::CoreError;
use mptree_storage::StorageError;
use thiserror::Error;

/// Errors produced by tree mutations, queries and repairs.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A sibling position or full path would not fit the configured widths.
    #[error("path overflow from '{path}': {reason}")]
    PathOverflow { path: String, reason: String },

    /// Moving `node` under `target` would create a cycle.
    #[error("cannot move '{node}' under its own descendant '{target}'")]
    InvalidMoveToDescendant { node: String, target: String },

    /// The input carried an id that the store already holds.
    #[error("node {id} already exists")]
    NodeAlreadyExists { id: NodeId },

    /// The position is not allowed for this operation or tree.
    #[error("invalid position '{position}': {reason}")]
    InvalidPosition { position: String, reason: String },

    /// A sorted position was requested on a tree without `node_order_by`.
    #[error("position '{position}' requires node_order_by")]
    MissingNodeOrderBy { position: String },

    /// A node handed to an operation no longer exists.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error(transparent)]
    Core(CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CoreError> for TreeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::PathOverflow { path, reason } => TreeError::PathOverflow { path, reason },
            other => TreeError::Core(other),
        }
    }
}
