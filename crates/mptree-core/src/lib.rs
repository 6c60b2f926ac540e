//! Core data model for mptree materialized-path trees.
//!
//! # Modules
//!
//! - [`codec`]: PathCodec, the fixed-width base-N segment encoding
//! - [`config`]: TreeConfig with alphabet, steplen, depth limit and sort keys
//! - [`node`]: TreeNode, NodeId and insertion inputs
//! - [`position`]: sibling and move positions
//! - [`ordering`]: payload comparison for sorted siblings
//! - [`error`]: CoreError

pub mod codec;
pub mod config;
pub mod error;
pub mod node;
pub mod ordering;
pub mod position;

// Re-export commonly used types
pub use codec::PathCodec;
pub use config::TreeConfig;
pub use error::CoreError;
pub use node::{NewNode, NodeId, NodeRecord, TreeNode};
pub use position::{MovePosition, SiblingPosition};
