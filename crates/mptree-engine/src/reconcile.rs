//! Out-of-band integrity checks and repair.
//!
//! [`Tree::find_problems`] scans every row and buckets the ids that break a
//! structural invariant. [`Tree::fix_tree`] recomputes the derived columns
//! (`depth`, `numchild`) and, on request, renumbers sibling paths so they
//! are contiguous and follow the configured ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use mptree_core::codec::PathCodec;
use mptree_core::node::{NodeId, TreeNode};
use mptree_core::ordering::compare_by_keys;
use mptree_storage::{DepthFilter, NodeRepository, PathRange};
use serde::Serialize;

use crate::error::TreeError;
use crate::tree::Tree;

/// Ids of nodes violating each structural invariant.
///
/// A node lands in at most one bucket: the first failed check wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeProblems {
    /// Paths containing characters outside the alphabet.
    pub malformed_paths: Vec<NodeId>,
    /// Paths whose length is not a whole number of segments.
    pub bad_length_paths: Vec<NodeId>,
    /// Nodes whose parent row does not exist.
    pub orphans: Vec<NodeId>,
    pub wrong_depth: Vec<NodeId>,
    pub wrong_numchild: Vec<NodeId>,
}

impl TreeProblems {
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.malformed_paths.len()
            + self.bad_length_paths.len()
            + self.orphans.len()
            + self.wrong_depth.len()
            + self.wrong_numchild.len()
    }
}

/// What [`Tree::fix_tree`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub depth_fixed: usize,
    pub numchild_fixed: usize,
    /// Nodes moved to a new sibling slot by the path repair pass.
    pub paths_rewritten: usize,
}

impl FixReport {
    pub fn is_empty(&self) -> bool {
        self.depth_fixed == 0 && self.numchild_fixed == 0 && self.paths_rewritten == 0
    }
}

fn well_formed(codec: &PathCodec, path: &str) -> bool {
    codec.in_alphabet(path) && codec.has_valid_length(path)
}

/// Number of well-formed direct children per parent path.
fn child_counts<'n>(codec: &PathCodec, nodes: &'n [TreeNode]) -> HashMap<&'n str, u32> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for node in nodes {
        if !well_formed(codec, &node.path) {
            continue;
        }
        if let Some(parent) = codec.parent_path(&node.path) {
            *counts.entry(parent).or_default() += 1;
        }
    }
    counts
}

impl<R: NodeRepository> Tree<R> {
    /// Read-only scan reporting every invariant violation by node id.
    pub fn find_problems(&self) -> Result<TreeProblems, TreeError> {
        let nodes = self.repo.all_nodes()?;
        let codec = &self.codec;
        let paths: HashSet<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
        let counts = child_counts(codec, &nodes);

        let mut problems = TreeProblems::default();
        for node in &nodes {
            if !codec.in_alphabet(&node.path) {
                problems.malformed_paths.push(node.id);
                continue;
            }
            if !codec.has_valid_length(&node.path) {
                problems.bad_length_paths.push(node.id);
                continue;
            }
            if let Some(parent) = codec.parent_path(&node.path) {
                if !paths.contains(parent) {
                    problems.orphans.push(node.id);
                    continue;
                }
            }
            if node.depth as usize != codec.depth_of(&node.path) {
                problems.wrong_depth.push(node.id);
                continue;
            }
            let actual = counts.get(node.path.as_str()).copied().unwrap_or(0);
            if node.numchild != actual {
                problems.wrong_numchild.push(node.id);
            }
        }

        if !problems.is_clean() {
            tracing::warn!(
                malformed = problems.malformed_paths.len(),
                bad_length = problems.bad_length_paths.len(),
                orphans = problems.orphans.len(),
                wrong_depth = problems.wrong_depth.len(),
                wrong_numchild = problems.wrong_numchild.len(),
                "tree integrity problems found"
            );
        }
        Ok(problems)
    }

    /// Recomputes `depth` and `numchild` wherever they disagree with the
    /// stored paths. With `fix_paths`, also renumbers the siblings under
    /// every parent into slots `1..=n` in their desired order, closing holes.
    pub fn fix_tree(&mut self, fix_paths: bool) -> Result<FixReport, TreeError> {
        let Tree {
            repo,
            codec,
            order_by,
        } = self;
        let codec = &*codec;
        let order_by = order_by.as_slice();

        let report = repo.atomic(|repo| {
            let mut report = FixReport::default();
            fix_scalars(repo, codec, &mut report)?;
            if fix_paths {
                fix_sibling_paths(repo, codec, order_by, &mut report)?;
            }
            Ok::<_, TreeError>(report)
        })?;

        tracing::info!(
            depth_fixed = report.depth_fixed,
            numchild_fixed = report.numchild_fixed,
            paths_rewritten = report.paths_rewritten,
            "tree repaired"
        );
        Ok(report)
    }
}

fn fix_scalars<R: NodeRepository>(
    repo: &mut R,
    codec: &PathCodec,
    report: &mut FixReport,
) -> Result<(), TreeError> {
    let nodes = repo.all_nodes()?;
    let counts = child_counts(codec, &nodes);

    for node in &nodes {
        let depth = codec.depth_of(&node.path) as u32;
        if node.depth != depth {
            repo.set_depth(node.id, depth)?;
            report.depth_fixed += 1;
        }
        let numchild = counts.get(node.path.as_str()).copied().unwrap_or(0);
        if node.numchild != numchild {
            repo.set_numchild(node.id, numchild)?;
            report.numchild_fixed += 1;
        }
    }
    Ok(())
}

/// Breadth-first renumbering. A level is only visited after its parent's
/// path is final.
fn fix_sibling_paths<R: NodeRepository>(
    repo: &mut R,
    codec: &PathCodec,
    order_by: &[String],
    report: &mut FixReport,
) -> Result<(), TreeError> {
    let mut queue: VecDeque<(String, u32)> = VecDeque::from([(String::new(), 1)]);

    while let Some((parent, depth)) = queue.pop_front() {
        let (low, high) = codec.children_interval(&parent);
        let range = PathRange::prefix(parent.as_str())
            .between(low, high)
            .depth(DepthFilter::Exactly(depth));
        let mut children: Vec<TreeNode> = repo
            .range_by_path_prefix(&range)?
            .into_iter()
            .filter(|n| well_formed(codec, &n.path))
            .collect();
        children.sort_by(|a, b| {
            compare_by_keys(&a.data, &b.data, order_by).then_with(|| a.path.cmp(&b.path))
        });

        let mut slots: HashMap<u64, usize> = HashMap::with_capacity(children.len());
        let mut highest = 0;
        for (index, child) in children.iter().enumerate() {
            let slot = codec.last_position(&child.path)?;
            highest = highest.max(slot);
            slots.insert(slot, index);
        }

        for index in 0..children.len() {
            let desired = index as u64 + 1;
            let current = codec.last_position(&children[index].path)?;
            if current != desired {
                if let Some(occupant) = slots.remove(&desired) {
                    highest += 1;
                    let scratch = codec.sibling_path(&children[occupant].path, highest)?;
                    repo.rewrite_path_prefix(&children[occupant].path, &scratch, codec.steplen())?;
                    tracing::debug!(from = %children[occupant].path, to = %scratch, "parked sibling");
                    children[occupant].path = scratch;
                    slots.insert(highest, occupant);
                }
                let target = codec.sibling_path(&children[index].path, desired)?;
                repo.rewrite_path_prefix(&children[index].path, &target, codec.steplen())?;
                tracing::debug!(from = %children[index].path, to = %target, "renumbered sibling");
                slots.remove(&current);
                slots.insert(desired, index);
                children[index].path = target;
                report.paths_rewritten += 1;
            }
            if children[index].numchild > 0 {
                queue.push_back((children[index].path.clone(), depth + 1));
            }
        }
    }
    Ok(())
}
