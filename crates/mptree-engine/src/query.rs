//! Read-only tree queries.
//!
//! [`TreeView`] answers structural questions (children, descendants,
//! siblings, ancestors) purely with path-prefix range scans and point
//! lookups against a [`NodeRepository`]. No query walks the tree
//! recursively: a subtree is one prefix scan, and path order is depth-first
//! pre-order by construction.

use std::cmp::Ordering;
use std::collections::HashMap;

use mptree_core::codec::PathCodec;
use mptree_core::node::{NodeId, TreeNode};
use mptree_core::ordering::compare_by_keys;
use mptree_storage::{DepthFilter, NodeRepository, PathRange};
use serde::Serialize;
use serde_json::Value;

use crate::error::TreeError;

/// One entry of [`TreeView::annotated_list`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedNode {
    pub node: TreeNode,
    /// True when this node opens a new nesting level.
    pub open: bool,
    /// Number of nesting levels closed right after this node.
    pub close: usize,
    /// Depth relative to the first node of the listing.
    pub level: usize,
}

/// Memoized parent lookups for the duration of one traversal.
#[derive(Debug, Default)]
pub struct ParentCache {
    parents: HashMap<String, Option<TreeNode>>,
}

impl ParentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Borrowed query facade over a repository.
pub struct TreeView<'a, R> {
    repo: &'a R,
    codec: &'a PathCodec,
}

impl<'a, R: NodeRepository> TreeView<'a, R> {
    pub fn new(repo: &'a R, codec: &'a PathCodec) -> Self {
        TreeView { repo, codec }
    }

    pub fn get(&self, id: NodeId) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.repo.get_by_id(id)?)
    }

    pub fn get_by_path(&self, path: &str) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.repo.get_by_path(path)?)
    }

    /// Current stored state of `node`, failing if it has been deleted.
    pub fn reload(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        self.get(node.id)?.ok_or(TreeError::NodeNotFound(node.id))
    }

    // -------------------------------------------------------------------
    // Roots
    // -------------------------------------------------------------------

    pub fn root_nodes(&self) -> Result<Vec<TreeNode>, TreeError> {
        let range = PathRange::prefix("").depth(DepthFilter::Exactly(1));
        Ok(self.repo.range_by_path_prefix(&range)?)
    }

    pub fn first_root(&self) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.root_nodes()?.into_iter().next())
    }

    pub fn last_root(&self) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.root_nodes()?.pop())
    }

    /// The root of the tree containing `node` (the node itself for roots).
    pub fn root(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        self.get_by_path(self.codec.basepath(&node.path, 1))
    }

    // -------------------------------------------------------------------
    // Children and descendants
    // -------------------------------------------------------------------

    pub fn children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        let (low, high) = self.codec.children_interval(&node.path);
        let range = PathRange::prefix(node.path.as_str())
            .between(low, high)
            .depth(DepthFilter::Exactly(node.depth + 1));
        Ok(self.repo.range_by_path_prefix(&range)?)
    }

    pub fn children_count(&self, node: &TreeNode) -> Result<usize, TreeError> {
        Ok(self.children(node)?.len())
    }

    pub fn first_child(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.children(node)?.into_iter().next())
    }

    pub fn last_child(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.children(node)?.pop())
    }

    /// Every node below `node`, in depth-first pre-order.
    pub fn descendants(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        let range =
            PathRange::prefix(node.path.as_str()).depth(DepthFilter::GreaterThan(node.depth));
        Ok(self.repo.range_by_path_prefix(&range)?)
    }

    pub fn descendant_count(&self, node: &TreeNode) -> Result<usize, TreeError> {
        Ok(self.descendants(node)?.len())
    }

    // -------------------------------------------------------------------
    // Siblings
    // -------------------------------------------------------------------

    /// All nodes sharing `node`'s parent, including `node`, ordered by path.
    pub fn siblings(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        if node.depth <= 1 {
            return self.root_nodes();
        }
        let parent = self.codec.basepath(&node.path, node.depth as usize - 1);
        let (low, high) = self.codec.children_interval(parent);
        let range = PathRange::prefix(parent)
            .between(low, high)
            .depth(DepthFilter::Exactly(node.depth));
        Ok(self.repo.range_by_path_prefix(&range)?)
    }

    pub fn first_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.siblings(node)?.into_iter().next())
    }

    pub fn last_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.siblings(node)?.pop())
    }

    pub fn prev_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        Ok(self
            .siblings(node)?
            .into_iter()
            .take_while(|s| s.path < node.path)
            .last())
    }

    pub fn next_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.siblings(node)?.into_iter().find(|s| s.path > node.path))
    }

    /// Siblings of `reference` whose payload sorts strictly after `data`,
    /// ordered by path. `exclude` drops one node (the one being moved).
    pub(crate) fn sorted_siblings_after(
        &self,
        reference: &TreeNode,
        data: &Value,
        order_by: &[String],
        exclude: Option<NodeId>,
    ) -> Result<Vec<TreeNode>, TreeError> {
        Ok(self
            .siblings(reference)?
            .into_iter()
            .filter(|s| Some(s.id) != exclude)
            .filter(|s| compare_by_keys(&s.data, data, order_by) == Ordering::Greater)
            .collect())
    }

    // -------------------------------------------------------------------
    // Ancestors
    // -------------------------------------------------------------------

    pub fn parent(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        if node.depth <= 1 {
            return Ok(None);
        }
        self.get_by_path(self.codec.basepath(&node.path, node.depth as usize - 1))
    }

    /// Like [`TreeView::parent`], answering repeated lookups from `cache`.
    pub fn parent_cached(
        &self,
        node: &TreeNode,
        cache: &mut ParentCache,
    ) -> Result<Option<TreeNode>, TreeError> {
        if node.depth <= 1 {
            return Ok(None);
        }
        let parent_path = self.codec.basepath(&node.path, node.depth as usize - 1);
        if let Some(hit) = cache.parents.get(parent_path) {
            return Ok(hit.clone());
        }
        let parent = self.get_by_path(parent_path)?;
        cache
            .parents
            .insert(parent_path.to_string(), parent.clone());
        Ok(parent)
    }

    /// Ancestors from the root down to the parent, in one batched lookup.
    pub fn ancestors(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        if node.depth <= 1 {
            return Ok(Vec::new());
        }
        let paths: Vec<String> = (1..node.depth as usize)
            .map(|depth| self.codec.basepath(&node.path, depth).to_string())
            .collect();
        Ok(self.repo.get_by_paths(&paths)?)
    }

    // -------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------

    pub fn is_sibling_of(&self, a: &TreeNode, b: &TreeNode) -> bool {
        a.depth == b.depth
            && self.codec.parent_path(&a.path) == self.codec.parent_path(&b.path)
    }

    pub fn is_child_of(&self, node: &TreeNode, parent: &TreeNode) -> bool {
        node.is_child_of(parent)
    }

    pub fn is_descendant_of(&self, node: &TreeNode, ancestor: &TreeNode) -> bool {
        node.is_descendant_of(ancestor)
    }

    // -------------------------------------------------------------------
    // Whole-tree listings
    // -------------------------------------------------------------------

    /// `parent` and its descendants in pre-order, or the whole forest.
    pub fn get_tree(&self, parent: Option<&TreeNode>) -> Result<Vec<TreeNode>, TreeError> {
        match parent {
            None => Ok(self.repo.all_nodes()?),
            Some(parent) => {
                let range = PathRange::prefix(parent.path.as_str());
                Ok(self.repo.range_by_path_prefix(&range)?)
            }
        }
    }

    /// Pre-order listing annotated with nesting markers for rendering.
    pub fn annotated_list(
        &self,
        parent: Option<&TreeNode>,
        max_depth: Option<u32>,
    ) -> Result<Vec<AnnotatedNode>, TreeError> {
        let nodes = self.get_tree(parent)?;
        let mut result: Vec<AnnotatedNode> = Vec::with_capacity(nodes.len());
        let mut start_depth: Option<u32> = None;
        let mut prev_depth: Option<u32> = None;

        for node in nodes {
            if max_depth.is_some_and(|max| node.depth > max) {
                continue;
            }
            let depth = node.depth;
            let start = *start_depth.get_or_insert(depth);
            let open = prev_depth.map_or(true, |prev| depth > prev);
            if let (Some(prev), Some(last)) = (prev_depth, result.last_mut()) {
                if depth < prev {
                    last.close = (prev - depth) as usize;
                }
            }
            result.push(AnnotatedNode {
                node,
                open,
                close: 0,
                level: depth.saturating_sub(start) as usize,
            });
            prev_depth = Some(depth);
        }
        if let (Some(start), Some(prev), Some(last)) = (start_depth, prev_depth, result.last_mut()) {
            last.close = (prev.saturating_sub(start) + 1) as usize;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mptree_core::node::NodeRecord;
    use mptree_storage::InMemoryRepository;
    use serde_json::json;

    fn seeded() -> InMemoryRepository {
        let mut repo = InMemoryRepository::new();
        for (path, numchild) in [
            ("0001", 3),
            ("00010001", 0),
            ("00010002", 1),
            ("000100020001", 0),
            ("00010004", 0),
            ("0002", 0),
        ] {
            repo.insert(NodeRecord {
                id: None,
                path: path.to_string(),
                depth: (path.len() / 4) as u32,
                numchild,
                data: json!({"name": path}),
            })
            .unwrap();
        }
        repo
    }

    fn paths(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.path.as_str()).collect()
    }

    #[test]
    fn children_and_descendants() {
        let repo = seeded();
        let codec = PathCodec::default();
        let view = TreeView::new(&repo, &codec);
        let root = view.get_by_path("0001").unwrap().unwrap();

        assert_eq!(
            paths(&view.children(&root).unwrap()),
            vec!["00010001", "00010002", "00010004"]
        );
        assert_eq!(
            paths(&view.descendants(&root).unwrap()),
            vec!["00010001", "00010002", "000100020001", "00010004"]
        );
        assert_eq!(view.descendant_count(&root).unwrap(), 4);
        assert_eq!(view.last_child(&root).unwrap().unwrap().path, "00010004");
    }

    #[test]
    fn siblings_tolerate_holes() {
        let repo = seeded();
        let codec = PathCodec::default();
        let view = TreeView::new(&repo, &codec);
        let middle = view.get_by_path("00010002").unwrap().unwrap();

        assert_eq!(view.siblings(&middle).unwrap().len(), 3);
        assert_eq!(view.prev_sibling(&middle).unwrap().unwrap().path, "00010001");
        assert_eq!(view.next_sibling(&middle).unwrap().unwrap().path, "00010004");
        let last = view.get_by_path("00010004").unwrap().unwrap();
        assert!(view.next_sibling(&last).unwrap().is_none());
        assert_eq!(paths(&view.root_nodes().unwrap()), vec!["0001", "0002"]);
    }

    #[test]
    fn ancestors_and_parent() {
        let repo = seeded();
        let codec = PathCodec::default();
        let view = TreeView::new(&repo, &codec);
        let leaf = view.get_by_path("000100020001").unwrap().unwrap();

        assert_eq!(
            paths(&view.ancestors(&leaf).unwrap()),
            vec!["0001", "00010002"]
        );
        assert_eq!(view.parent(&leaf).unwrap().unwrap().path, "00010002");
        assert_eq!(view.root(&leaf).unwrap().unwrap().path, "0001");

        let root = view.get_by_path("0001").unwrap().unwrap();
        assert!(view.parent(&root).unwrap().is_none());
        assert!(view.ancestors(&root).unwrap().is_empty());
    }

    #[test]
    fn parent_cache_memoizes() {
        let repo = seeded();
        let codec = PathCodec::default();
        let view = TreeView::new(&repo, &codec);
        let mut cache = ParentCache::new();
        for path in ["00010001", "00010002", "00010004"] {
            let node = view.get_by_path(path).unwrap().unwrap();
            let parent = view.parent_cached(&node, &mut cache).unwrap().unwrap();
            assert_eq!(parent.path, "0001");
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn annotated_list_markers() {
        let repo = seeded();
        let codec = PathCodec::default();
        let view = TreeView::new(&repo, &codec);
        let root = view.get_by_path("0001").unwrap().unwrap();
        let list = view.annotated_list(Some(&root), None).unwrap();

        let summary: Vec<(&str, bool, usize, usize)> = list
            .iter()
            .map(|e| (e.node.path.as_str(), e.open, e.close, e.level))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("0001", true, 0, 0),
                ("00010001", true, 0, 1),
                ("00010002", false, 0, 1),
                ("000100020001", true, 1, 2),
                ("00010004", false, 2, 1),
            ]
        );
    }

    #[test]
    fn sibling_predicate_uses_parent_paths() {
        let repo = seeded();
        let codec = PathCodec::default();
        let view = TreeView::new(&repo, &codec);
        let a = view.get_by_path("00010001").unwrap().unwrap();
        let b = view.get_by_path("00010004").unwrap().unwrap();
        let root = view.get_by_path("0002").unwrap().unwrap();
        assert!(view.is_sibling_of(&a, &b));
        assert!(!view.is_sibling_of(&a, &root));
    }
}
