//! Mutation handlers: add-root, add-child, add-sibling, move and delete.
//!
//! Every handler follows the same shape: validate the request, compute the
//! target path, shift any siblings that are in the way, then write. All
//! writes of one handler run inside a single [`NodeRepository::atomic`]
//! unit, so an error at any step leaves the store as it was.
//!
//! Sibling positions may contain holes (left by deletes). Inserting never
//! closes them: shifting stops at the first hole after the insertion slot.
//! Only [`Tree::fix_tree`](crate::Tree::fix_tree) with path repair
//! renumbers siblings.

use mptree_core::codec::PathCodec;
use mptree_core::node::{NewNode, NodeId, NodeRecord, TreeNode};
use mptree_core::position::{MovePosition, SiblingPosition};
use mptree_storage::NodeRepository;
use serde_json::Value;

use crate::error::TreeError;
use crate::query::TreeView;
use crate::tree::Tree;

/// A subtree being relocated by a move.
struct MovingBranch {
    id: NodeId,
    path: String,
    /// Extra characters below the branch root (deepest path minus own path).
    extra_len: usize,
}

/// Result of slot computation and sibling shifting.
struct Placement {
    /// Where the moving branch was just before its final rewrite.
    oldpath: Option<String>,
    newpath: String,
}

/// Borrowed write context used inside one atomic unit.
pub(crate) struct Writer<'a, R> {
    pub(crate) repo: &'a mut R,
    pub(crate) codec: &'a PathCodec,
    pub(crate) order_by: &'a [String],
}

impl<'a, R: NodeRepository> Writer<'a, R> {
    pub(crate) fn view(&self) -> TreeView<'_, R> {
        TreeView::new(&*self.repo, self.codec)
    }

    fn ensure_new(&self, input: &NewNode) -> Result<(), TreeError> {
        if let Some(id) = input.id {
            if self.repo.get_by_id(id)?.is_some() {
                return Err(TreeError::NodeAlreadyExists { id });
            }
        }
        Ok(())
    }

    fn insert_at(&mut self, path: String, input: NewNode) -> Result<TreeNode, TreeError> {
        self.codec.check_len(&path)?;
        let depth = self.codec.depth_of(&path) as u32;
        tracing::debug!(%path, depth, "inserting node");
        Ok(self.repo.insert(NodeRecord {
            id: input.id,
            path,
            depth,
            numchild: 0,
            data: input.data,
        })?)
    }

    fn rewrite(&mut self, old_prefix: &str, new_prefix: &str) -> Result<usize, TreeError> {
        let rows = self
            .repo
            .rewrite_path_prefix(old_prefix, new_prefix, self.codec.steplen())?;
        tracing::debug!(old_prefix, new_prefix, rows, "moved branch");
        Ok(rows)
    }

    pub(crate) fn add_root(&mut self, input: NewNode) -> Result<TreeNode, TreeError> {
        self.ensure_new(&input)?;
        let last_root = self.view().last_root()?;
        match last_root {
            Some(last) if !self.order_by.is_empty() => {
                self.add_sibling(&last, SiblingPosition::SortedSibling, input)
            }
            Some(last) => {
                let path = self.codec.inc_path(&last.path)?;
                self.insert_at(path, input)
            }
            None => {
                let path = self.codec.child_path("", 1)?;
                self.insert_at(path, input)
            }
        }
    }

    pub(crate) fn add_child(
        &mut self,
        parent: &TreeNode,
        input: NewNode,
    ) -> Result<TreeNode, TreeError> {
        self.ensure_new(&input)?;
        let parent = self.view().reload(parent)?;
        let last_child = self.view().last_child(&parent)?;

        if let (Some(last), false) = (&last_child, self.order_by.is_empty()) {
            return self.add_sibling(last, SiblingPosition::SortedSibling, input);
        }
        let path = match &last_child {
            None => self.codec.child_path(&parent.path, 1)?,
            Some(last) => self.codec.inc_path(&last.path)?,
        };
        let node = self.insert_at(path, input)?;
        self.repo.update_numchild(&parent.path, 1)?;
        Ok(node)
    }

    pub(crate) fn add_sibling(
        &mut self,
        reference: &TreeNode,
        pos: SiblingPosition,
        input: NewNode,
    ) -> Result<TreeNode, TreeError> {
        self.ensure_new(&input)?;
        let reference = self.view().reload(reference)?;

        let (pos, newpos, siblings) = self.sorted_slot(pos, &reference, &input.data, None)?;
        let placement = self.reorder(
            pos,
            newpos,
            reference.depth as usize,
            &reference,
            siblings,
            None,
        )?;

        let node = self.insert_at(placement.newpath, input)?;
        if let Some(parent) = self.codec.parent_path(&node.path) {
            self.repo.update_numchild(parent, 1)?;
        }
        Ok(node)
    }

    pub(crate) fn move_node(
        &mut self,
        node: &TreeNode,
        target: &TreeNode,
        pos: MovePosition,
    ) -> Result<Option<String>, TreeError> {
        let node = self.view().reload(node)?;
        let target = self.view().reload(target)?;

        if target.is_descendant_of(&node) || (pos.is_child() && target.id == node.id) {
            return Err(TreeError::InvalidMoveToDescendant {
                node: node.path,
                target: target.path,
            });
        }

        // Moving to a child of `target` becomes a sibling move relative to
        // its last child, or a plain first-slot placement if it is a leaf.
        let mut newdepth = target.depth as usize;
        let mut sib_pos = pos.to_sibling();
        let mut newpos = None;
        let mut reference = target;
        if pos.is_child() {
            newdepth += 1;
            match self.view().last_child(&reference)? {
                Some(last) => reference = last,
                None => {
                    newpos = Some(1);
                    sib_pos = SiblingPosition::FirstSibling;
                }
            }
        }

        if newpos.is_none() && reference.id == node.id && self.is_noop(&reference, sib_pos)? {
            return Ok(None);
        }

        let (sib_pos, sorted_pos, siblings) = if newpos.is_none() {
            self.sorted_slot(sib_pos, &reference, &node.data, Some(node.id))?
        } else {
            (sib_pos, None, Vec::new())
        };
        let newpos = newpos.or(sorted_pos);

        let deepest = self
            .view()
            .descendants(&node)?
            .iter()
            .map(|d| d.path.len())
            .max()
            .unwrap_or(node.path.len());
        let branch = MovingBranch {
            id: node.id,
            path: node.path.clone(),
            extra_len: deepest.saturating_sub(node.path.len()),
        };

        let placement = self.reorder(
            sib_pos,
            newpos,
            newdepth,
            &reference,
            siblings,
            Some(&branch),
        )?;
        let oldpath = placement.oldpath.unwrap_or(branch.path);

        let old_parent = self.codec.parent_path(&oldpath);
        let new_parent = self.codec.parent_path(&placement.newpath);
        if old_parent != new_parent {
            if let Some(parent) = old_parent {
                self.repo.update_numchild(parent, -1)?;
            }
            if let Some(parent) = new_parent {
                self.repo.update_numchild(parent, 1)?;
            }
        }
        Ok(Some(placement.newpath))
    }

    /// Moves that would leave the node exactly where it is.
    fn is_noop(&self, node: &TreeNode, pos: SiblingPosition) -> Result<bool, TreeError> {
        Ok(match pos {
            SiblingPosition::Left | SiblingPosition::Right => true,
            SiblingPosition::LastSibling => self
                .view()
                .last_sibling(node)?
                .is_some_and(|last| last.id == node.id),
            SiblingPosition::FirstSibling => self
                .view()
                .first_sibling(node)?
                .is_some_and(|first| first.id == node.id),
            SiblingPosition::SortedSibling => false,
        })
    }

    /// For sorted positions, finds the first sibling that sorts after `data`
    /// and returns its slot together with every sibling that sorts after.
    /// With no such sibling the position degrades to last-sibling.
    fn sorted_slot(
        &self,
        pos: SiblingPosition,
        reference: &TreeNode,
        data: &Value,
        exclude: Option<NodeId>,
    ) -> Result<(SiblingPosition, Option<u64>, Vec<TreeNode>), TreeError> {
        if !pos.is_sorted() {
            return Ok((pos, None, Vec::new()));
        }
        let greater = self
            .view()
            .sorted_siblings_after(reference, data, self.order_by, exclude)?;
        match greater.first() {
            Some(first) => {
                let slot = self.codec.last_position(&first.path)?;
                Ok((pos, Some(slot), greater))
            }
            None => Ok((SiblingPosition::LastSibling, None, Vec::new())),
        }
    }

    fn check_branch_fits(
        &self,
        newpath: &str,
        branch: Option<&MovingBranch>,
    ) -> Result<(), TreeError> {
        self.codec.check_len(newpath)?;
        if let Some(branch) = branch {
            let deepest = newpath.len() + branch.extra_len;
            if deepest > self.codec.max_path_len() {
                return Err(TreeError::PathOverflow {
                    path: newpath.to_string(),
                    reason: format!(
                        "moved branch would reach length {deepest}, maximum is {}",
                        self.codec.max_path_len()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Computes the target path for an insert or move next to `target` and
    /// shifts the siblings that occupy it. When `branch` is given, the
    /// branch is rewritten into the target path as the last step.
    fn reorder(
        &mut self,
        pos: SiblingPosition,
        newpos: Option<u64>,
        newdepth: usize,
        target: &TreeNode,
        siblings: Vec<TreeNode>,
        branch: Option<&MovingBranch>,
    ) -> Result<Placement, TreeError> {
        let mut oldpath = branch.map(|b| b.path.clone());

        if newpos.is_none() {
            let last = self
                .view()
                .last_sibling(target)?
                .ok_or(TreeError::NodeNotFound(target.id))?;
            let at_end = pos == SiblingPosition::LastSibling
                || (pos == SiblingPosition::Right && last.id == target.id);
            if at_end {
                // Fast path: append after the last sibling, nothing shifts.
                if branch.is_some_and(|b| b.id == last.id) {
                    return Ok(Placement {
                        newpath: last.path.clone(),
                        oldpath,
                    });
                }
                let newpath = self.codec.inc_path(&last.path)?;
                self.check_branch_fits(&newpath, branch)?;
                if let Some(old) = &oldpath {
                    self.rewrite(old, &newpath)?;
                }
                return Ok(Placement { oldpath, newpath });
            }
        }

        let (newpos, siblings) = match newpos {
            Some(slot) => (slot, siblings),
            None => {
                let basenum = self.codec.last_position(&target.path)?;
                let all = self.view().siblings(target)?;
                match pos {
                    SiblingPosition::FirstSibling => (1, all),
                    SiblingPosition::Left => (
                        basenum,
                        all.into_iter().filter(|s| s.path >= target.path).collect(),
                    ),
                    SiblingPosition::Right => (
                        basenum + 1,
                        all.into_iter().filter(|s| s.path > target.path).collect(),
                    ),
                    other => {
                        return Err(TreeError::InvalidPosition {
                            position: other.to_string(),
                            reason: "no insertion slot could be computed".to_string(),
                        })
                    }
                }
            }
        };
        let siblings: Vec<TreeNode> = match branch {
            Some(b) => siblings.into_iter().filter(|s| s.id != b.id).collect(),
            None => siblings,
        };

        let parent = self.codec.basepath(&target.path, newdepth.saturating_sub(1));
        let newpath = self.codec.child_path(parent, newpos)?;
        self.check_branch_fits(&newpath, branch)?;

        // A branch moving left among its own siblings sits inside the range
        // about to shift; park it past the last sibling first.
        let mut parked = None;
        if let Some(old) = &oldpath {
            let same_parent = old.len() == newpath.len()
                && self.codec.parent_path(old) == self.codec.parent_path(&newpath);
            if same_parent && !siblings.is_empty() && newpath < *old {
                let last = self
                    .view()
                    .last_sibling(target)?
                    .ok_or(TreeError::NodeNotFound(target.id))?;
                let basenum = self.codec.last_position(&last.path)?;
                let temp = self.codec.sibling_path(&newpath, basenum + 2)?;
                self.rewrite(old, &temp)?;
                parked = Some(temp);
            }
        }

        // Only the contiguous run starting at the slot needs to move; the
        // first hole absorbs the shift.
        let mut to_shift = Vec::new();
        let mut prior = newpath.clone();
        for sibling in &siblings {
            if sibling.path > prior {
                break;
            }
            to_shift.push(sibling.path.clone());
            prior = self.codec.inc_path(&sibling.path)?;
        }

        for path in to_shift.iter().rev() {
            let shifted = self.codec.inc_path(path)?;
            self.rewrite(path, &shifted)?;
            if let Some(old) = oldpath.as_mut() {
                if old.starts_with(path.as_str()) {
                    *old = format!("{shifted}{}", &old[path.len()..]);
                }
            }
        }

        if branch.is_some() {
            let from = parked.or_else(|| oldpath.clone());
            if let Some(from) = from {
                if from != newpath {
                    self.rewrite(&from, &newpath)?;
                }
            }
        }
        Ok(Placement { oldpath, newpath })
    }

    pub(crate) fn delete(&mut self, node: &TreeNode) -> Result<usize, TreeError> {
        let node = self.view().reload(node)?;
        let deleted = self.repo.delete_by_path_or_prefix(&node.path)?;
        if let Some(parent) = self.codec.parent_path(&node.path) {
            self.repo.update_numchild(parent, -1)?;
        }
        tracing::debug!(path = %node.path, rows = deleted, "deleted branch");
        Ok(deleted)
    }
}

impl<R: NodeRepository> Tree<R> {
    pub(crate) fn writer_atomic<T, F>(&mut self, f: F) -> Result<T, TreeError>
    where
        F: FnOnce(&mut Writer<'_, R>) -> Result<T, TreeError>,
    {
        let Tree {
            repo,
            codec,
            order_by,
        } = self;
        let codec = &*codec;
        let order_by = order_by.as_slice();
        repo.atomic(|repo| {
            let mut writer = Writer {
                repo,
                codec,
                order_by,
            };
            f(&mut writer)
        })
    }

    /// Appends a new top-level node (or places it by sort order when
    /// `node_order_by` is configured).
    pub fn add_root(&mut self, input: impl Into<NewNode>) -> Result<TreeNode, TreeError> {
        let input = input.into();
        let node = self.writer_atomic(|w| w.add_root(input))?;
        tracing::info!(id = %node.id, path = %node.path, "added root");
        Ok(node)
    }

    /// Appends a new child under `parent` and bumps its numchild.
    pub fn add_child(
        &mut self,
        parent: &TreeNode,
        input: impl Into<NewNode>,
    ) -> Result<TreeNode, TreeError> {
        let input = input.into();
        let node = self.writer_atomic(|w| w.add_child(parent, input))?;
        tracing::info!(id = %node.id, path = %node.path, "added child");
        Ok(node)
    }

    /// Inserts a new node next to `reference`. `None` picks the tree's
    /// default position.
    pub fn add_sibling(
        &mut self,
        reference: &TreeNode,
        pos: Option<SiblingPosition>,
        input: impl Into<NewNode>,
    ) -> Result<TreeNode, TreeError> {
        let pos = self.resolve_sibling_pos(pos)?;
        let input = input.into();
        let node = self.writer_atomic(|w| w.add_sibling(reference, pos, input))?;
        tracing::info!(id = %node.id, path = %node.path, %pos, "added sibling");
        Ok(node)
    }

    /// Relocates `node` and its whole subtree relative to `target`.
    ///
    /// Returns the moved node as stored afterwards.
    pub fn move_node(
        &mut self,
        node: &TreeNode,
        target: &TreeNode,
        pos: Option<MovePosition>,
    ) -> Result<TreeNode, TreeError> {
        let pos = self.resolve_move_pos(pos)?;
        match self.writer_atomic(|w| w.move_node(node, target, pos))? {
            Some(newpath) => {
                tracing::info!(id = %node.id, from = %node.path, to = %newpath, %pos, "moved node");
            }
            None => tracing::debug!(id = %node.id, %pos, "move left node in place"),
        }
        self.reload(node)
    }

    /// Deletes `node` and its descendants, decrementing the parent's
    /// numchild. Returns the number of removed rows.
    pub fn delete(&mut self, node: &TreeNode) -> Result<usize, TreeError> {
        let deleted = self.writer_atomic(|w| w.delete(node))?;
        tracing::info!(id = %node.id, rows = deleted, "deleted node");
        Ok(deleted)
    }

    /// Deletes several branches at once. Nodes already covered by another
    /// node of the set are skipped.
    pub fn delete_many(&mut self, nodes: &[TreeNode]) -> Result<usize, TreeError> {
        let deleted = self.writer_atomic(|w| {
            let mut current = Vec::with_capacity(nodes.len());
            for node in nodes {
                current.push(w.view().reload(node)?);
            }
            current.sort_by(|a, b| a.path.cmp(&b.path));

            let mut tops: Vec<TreeNode> = Vec::new();
            for node in current {
                let covered = tops
                    .last()
                    .is_some_and(|top| node.path.starts_with(top.path.as_str()));
                if !covered {
                    tops.push(node);
                }
            }
            let mut total = 0;
            for top in &tops {
                total += w.delete(top)?;
            }
            Ok(total)
        })?;
        tracing::info!(rows = deleted, "deleted nodes");
        Ok(deleted)
    }

    /// Replaces the caller payload of `node`. Does not reorder siblings.
    pub fn update_data(&mut self, node: &TreeNode, data: Value) -> Result<TreeNode, TreeError> {
        self.repo.update_data(node.id, &data)?;
        tracing::debug!(id = %node.id, "updated node data");
        self.reload(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mptree_core::config::TreeConfig;
    use mptree_storage::InMemoryRepository;
    use serde_json::json;

    fn tree() -> Tree<InMemoryRepository> {
        Tree::new(InMemoryRepository::new(), &TreeConfig::default()).unwrap()
    }

    fn paths(tree: &Tree<InMemoryRepository>) -> Vec<(String, String)> {
        tree.view()
            .get_tree(None)
            .unwrap()
            .into_iter()
            .map(|n| (n.path, n.data["name"].as_str().unwrap_or("").to_string()))
            .collect()
    }

    fn named(name: &str) -> NewNode {
        NewNode::new(json!({ "name": name }))
    }

    #[test]
    fn add_roots_append() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let b = tree.add_root(named("b")).unwrap();
        assert_eq!((a.path.as_str(), a.depth), ("0001", 1));
        assert_eq!((b.path.as_str(), b.depth), ("0002", 1));
    }

    #[test]
    fn add_child_appends_after_last_child() {
        let mut tree = tree();
        let root = tree.add_root(named("r")).unwrap();
        let first = tree.add_child(&root, named("c1")).unwrap();
        let second = tree.add_child(&root, named("c2")).unwrap();
        assert_eq!(first.path, "00010001");
        assert_eq!(second.path, "00010002");
        assert_eq!(tree.reload(&root).unwrap().numchild, 2);
    }

    #[test]
    fn add_sibling_first_shifts_contiguous_run_only() {
        let mut tree = tree();
        let root = tree.add_root(named("r")).unwrap();
        let c1 = tree.add_child(&root, named("c1")).unwrap();
        let c2 = tree.add_child(&root, named("c2")).unwrap();
        tree.add_child(&root, named("c3")).unwrap();
        tree.add_child(&root, named("c4")).unwrap();
        // Open a hole at position 3.
        let c3 = tree.get_by_path("00010003").unwrap().unwrap();
        tree.delete(&c3).unwrap();

        tree.add_sibling(&c2, Some(SiblingPosition::FirstSibling), named("new"))
            .unwrap();
        let children: Vec<(String, String)> = tree
            .children(&root)
            .unwrap()
            .into_iter()
            .map(|n| (n.path, n.data["name"].as_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            children,
            vec![
                ("00010001".to_string(), "new".to_string()),
                ("00010002".to_string(), "c1".to_string()),
                ("00010003".to_string(), "c2".to_string()),
                ("00010004".to_string(), "c4".to_string()),
            ]
        );
        assert_eq!(tree.reload(&c1).unwrap().path, "00010002");
        assert_eq!(tree.reload(&root).unwrap().numchild, 4);
    }

    #[test]
    fn add_sibling_right_of_last_uses_fast_path() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let b = tree.add_sibling(&a, Some(SiblingPosition::Right), named("b")).unwrap();
        assert_eq!(b.path, "0002");
        let c = tree.add_sibling(&a, Some(SiblingPosition::Right), named("c")).unwrap();
        assert_eq!(c.path, "0002");
        assert_eq!(tree.reload(&b).unwrap().path, "0003");
    }

    #[test]
    fn explicit_existing_id_is_rejected() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let err = tree
            .add_root(named("dup").with_id(a.id))
            .unwrap_err();
        assert!(matches!(err, TreeError::NodeAlreadyExists { id } if id == a.id));
        let ok = tree.add_root(named("kept").with_id(NodeId(77))).unwrap();
        assert_eq!(ok.id, NodeId(77));
    }

    #[test]
    fn move_left_among_siblings_parks_branch() {
        let mut tree = tree();
        for name in ["a", "b", "c", "d"] {
            tree.add_root(named(name)).unwrap();
        }
        let c = tree.get_by_path("0003").unwrap().unwrap();
        tree.add_child(&c, named("c-child")).unwrap();
        let a = tree.get_by_path("0001").unwrap().unwrap();

        let moved = tree.move_node(&c, &a, Some(MovePosition::Left)).unwrap();
        assert_eq!(moved.path, "0001");
        assert_eq!(
            paths(&tree),
            vec![
                ("0001".to_string(), "c".to_string()),
                ("00010001".to_string(), "c-child".to_string()),
                ("0002".to_string(), "a".to_string()),
                ("0003".to_string(), "b".to_string()),
                ("0004".to_string(), "d".to_string()),
            ]
        );
    }

    #[test]
    fn move_to_left_of_own_ancestor_tracks_shifted_path() {
        let mut tree = tree();
        let r1 = tree.add_root(named("r1")).unwrap();
        tree.add_root(named("r2")).unwrap();
        let child = tree.add_child(&r1, named("x")).unwrap();

        let moved = tree.move_node(&child, &r1, Some(MovePosition::Left)).unwrap();
        assert_eq!(moved.path, "0001");
        assert_eq!(moved.depth, 1);
        let r1 = tree.reload(&r1).unwrap();
        assert_eq!(r1.path, "0002");
        assert_eq!(r1.numchild, 0);
        assert_eq!(tree.get_by_path("0003").unwrap().unwrap().data["name"], "r2");
    }

    #[test]
    fn noop_moves_write_nothing() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let b = tree.add_root(named("b")).unwrap();
        let before = paths(&tree);
        tree.move_node(&a, &a, Some(MovePosition::Left)).unwrap();
        tree.move_node(&b, &b, Some(MovePosition::LastSibling)).unwrap();
        tree.move_node(&a, &a, Some(MovePosition::FirstSibling)).unwrap();
        tree.move_node(&b, &a, Some(MovePosition::LastSibling)).unwrap();
        assert_eq!(paths(&tree), before);
    }

    #[test]
    fn move_into_self_is_rejected() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let err = tree
            .move_node(&a, &a, Some(MovePosition::FirstChild))
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidMoveToDescendant { .. }));
    }

    #[test]
    fn move_branch_deeper_checks_max_depth() {
        let config = TreeConfig {
            max_depth: 3,
            ..TreeConfig::default()
        };
        let mut tree = Tree::new(InMemoryRepository::new(), &config).unwrap();
        let a = tree.add_root(named("a")).unwrap();
        let a1 = tree.add_child(&a, named("a1")).unwrap();
        tree.add_child(&a1, named("a11")).unwrap();
        let b = tree.add_root(named("b")).unwrap();
        let b1 = tree.add_child(&b, named("b1")).unwrap();

        let err = tree
            .move_node(&a1, &b1, Some(MovePosition::FirstChild))
            .unwrap_err();
        assert!(matches!(err, TreeError::PathOverflow { .. }));
        assert_eq!(tree.reload(&a1).unwrap().path, "00010001");
    }

    #[test]
    fn add_child_past_max_depth_overflows() {
        let config = TreeConfig {
            max_depth: 1,
            ..TreeConfig::default()
        };
        let mut tree = Tree::new(InMemoryRepository::new(), &config).unwrap();
        let a = tree.add_root(named("a")).unwrap();
        assert!(matches!(
            tree.add_child(&a, named("x")),
            Err(TreeError::PathOverflow { .. })
        ));
        assert_eq!(tree.reload(&a).unwrap().numchild, 0);
    }

    #[test]
    fn sorted_inserts_keep_order() {
        let config = TreeConfig::default().with_order_by(["name"]);
        let mut tree = Tree::new(InMemoryRepository::new(), &config).unwrap();
        for name in ["m", "c", "x", "a"] {
            tree.add_root(named(name)).unwrap();
        }
        let names: Vec<String> = tree
            .root_nodes()
            .unwrap()
            .into_iter()
            .map(|n| n.data["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "c", "m", "x"]);

        let root = tree.get_by_path("0001").unwrap().unwrap();
        for name in ["q", "b", "k"] {
            tree.add_child(&root, named(name)).unwrap();
        }
        let children: Vec<String> = tree
            .children(&root)
            .unwrap()
            .into_iter()
            .map(|n| n.data["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(children, vec!["b", "k", "q"]);
        assert_eq!(tree.reload(&root).unwrap().numchild, 3);
    }

    #[test]
    fn sorted_move_places_by_key() {
        let config = TreeConfig::default().with_order_by(["name"]);
        let mut tree = Tree::new(InMemoryRepository::new(), &config).unwrap();
        let a = tree.add_root(named("a")).unwrap();
        let z = tree.add_root(named("z")).unwrap();
        for name in ["b", "d"] {
            tree.add_child(&z, named(name)).unwrap();
        }
        let c = tree.add_child(&a, named("c")).unwrap();

        tree.move_node(&c, &z, Some(MovePosition::SortedChild)).unwrap();
        let children: Vec<String> = tree
            .children(&tree.reload(&z).unwrap())
            .unwrap()
            .into_iter()
            .map(|n| n.data["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(children, vec!["b", "c", "d"]);
        assert_eq!(tree.reload(&a).unwrap().numchild, 0);
        assert_eq!(tree.reload(&z).unwrap().numchild, 3);
    }

    #[test]
    fn delete_many_skips_covered_nodes() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let a1 = tree.add_child(&a, named("a1")).unwrap();
        let b = tree.add_root(named("b")).unwrap();
        let b1 = tree.add_child(&b, named("b1")).unwrap();
        tree.add_child(&b, named("b2")).unwrap();

        let deleted = tree.delete_many(&[a1.clone(), a.clone(), b1]).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(tree.reload(&b).unwrap().numchild, 1);
        assert!(tree.get(a1.id).unwrap().is_none());
    }

    #[test]
    fn update_data_keeps_position() {
        let mut tree = tree();
        let a = tree.add_root(named("a")).unwrap();
        let updated = tree.update_data(&a, json!({"name": "renamed"})).unwrap();
        assert_eq!(updated.path, "0001");
        assert_eq!(updated.data["name"], "renamed");
    }
}
