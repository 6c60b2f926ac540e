//! Materialized-path tree operations over any [`NodeRepository`].
//!
//! A [`Tree`] couples a repository with a [`PathCodec`](mptree_core::PathCodec)
//! and optional sort keys. Every node's position is encoded in its path:
//! one fixed-width segment per level, so subtree queries are prefix range
//! scans and sibling order is path order.
//!
//! # Modules
//!
//! - [`tree`]: the Tree handle and position validation
//! - [`mutation`]: add-root, add-child, add-sibling, move, delete
//! - [`query`]: TreeView read-only queries, annotated listings, ParentCache
//! - [`reconcile`]: find_problems and fix_tree
//! - [`bulk`]: nested dump and load
//! - [`error`]: TreeError
//!
//! [`NodeRepository`]: mptree_storage::NodeRepository

pub mod bulk;
pub mod error;
pub mod mutation;
pub mod query;
pub mod reconcile;
pub mod tree;

// Re-export commonly used types
pub use bulk::DumpedNode;
pub use error::TreeError;
pub use query::{AnnotatedNode, ParentCache, TreeView};
pub use reconcile::{FixReport, TreeProblems};
pub use tree::Tree;
