//! The [`Tree`] handle: one repository plus the configuration that gives its
//! rows meaning.

use mptree_core::codec::PathCodec;
use mptree_core::config::TreeConfig;
use mptree_core::node::{NodeId, TreeNode};
use mptree_core::position::{MovePosition, SiblingPosition};
use mptree_storage::NodeRepository;

use crate::error::TreeError;
use crate::query::TreeView;

/// A materialized-path tree stored in `R`.
///
/// Mutations are methods on this type (see the `mutation` module); each runs
/// inside [`NodeRepository::atomic`] so a failure part way through leaves
/// the store untouched. The tree itself holds no locks: concurrent writers
/// must be serialized by the store or the caller.
pub struct Tree<R> {
    pub(crate) repo: R,
    pub(crate) codec: PathCodec,
    pub(crate) order_by: Vec<String>,
}

impl<R: NodeRepository> Tree<R> {
    /// Wraps `repo` using `config`, validating the configuration.
    pub fn new(repo: R, config: &TreeConfig) -> Result<Self, TreeError> {
        Ok(Tree {
            repo,
            codec: config.codec()?,
            order_by: config.node_order_by.clone(),
        })
    }

    /// Wraps `repo` with an already-built codec.
    pub fn with_codec(repo: R, codec: PathCodec, order_by: Vec<String>) -> Self {
        Tree {
            repo,
            codec,
            order_by,
        }
    }

    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    pub fn node_order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Direct access to the store, bypassing every tree invariant.
    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_repository(self) -> R {
        self.repo
    }

    /// Read-only query facade.
    pub fn view(&self) -> TreeView<'_, R> {
        TreeView::new(&self.repo, &self.codec)
    }

    // -------------------------------------------------------------------
    // Common queries
    // -------------------------------------------------------------------

    pub fn get(&self, id: NodeId) -> Result<Option<TreeNode>, TreeError> {
        self.view().get(id)
    }

    pub fn get_by_path(&self, path: &str) -> Result<Option<TreeNode>, TreeError> {
        self.view().get_by_path(path)
    }

    /// Current stored state of `node`.
    pub fn reload(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        self.view().reload(node)
    }

    pub fn root_nodes(&self) -> Result<Vec<TreeNode>, TreeError> {
        self.view().root_nodes()
    }

    pub fn children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.view().children(node)
    }

    pub fn descendants(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.view().descendants(node)
    }

    pub fn siblings(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.view().siblings(node)
    }

    pub fn ancestors(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        self.view().ancestors(node)
    }

    pub fn parent(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        self.view().parent(node)
    }

    // -------------------------------------------------------------------
    // Position validation
    // -------------------------------------------------------------------

    /// Fills in the default sibling position and checks it against the
    /// ordering mode of this tree.
    pub(crate) fn resolve_sibling_pos(
        &self,
        pos: Option<SiblingPosition>,
    ) -> Result<SiblingPosition, TreeError> {
        let sorted = !self.order_by.is_empty();
        let pos = pos.unwrap_or(if sorted {
            SiblingPosition::SortedSibling
        } else {
            SiblingPosition::LastSibling
        });
        self.check_sorted(pos.as_str(), pos.is_sorted(), "sorted-sibling")?;
        Ok(pos)
    }

    /// Same as [`Tree::resolve_sibling_pos`] for move positions.
    pub(crate) fn resolve_move_pos(
        &self,
        pos: Option<MovePosition>,
    ) -> Result<MovePosition, TreeError> {
        let sorted = !self.order_by.is_empty();
        let pos = pos.unwrap_or(if sorted {
            MovePosition::SortedSibling
        } else {
            MovePosition::LastSibling
        });
        self.check_sorted(pos.as_str(), pos.is_sorted(), "sorted-sibling or sorted-child")?;
        Ok(pos)
    }

    fn check_sorted(&self, name: &str, is_sorted: bool, allowed: &str) -> Result<(), TreeError> {
        if !self.order_by.is_empty() && !is_sorted {
            return Err(TreeError::InvalidPosition {
                position: name.to_string(),
                reason: format!("node_order_by is set, use {allowed}"),
            });
        }
        if self.order_by.is_empty() && is_sorted {
            return Err(TreeError::MissingNodeOrderBy {
                position: name.to_string(),
            });
        }
        Ok(())
    }
}
