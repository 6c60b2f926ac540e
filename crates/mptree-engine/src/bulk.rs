//! Nested export and import of whole subtrees.
//!
//! A dump is independent of the path encoding: it records only nesting,
//! payloads and (optionally) ids. Dumping, reconfiguring the codec and
//! loading again is how a populated tree changes `steplen` or alphabet.

use mptree_core::node::{NewNode, NodeId, TreeNode};
use mptree_storage::NodeRepository;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TreeError;
use crate::tree::Tree;

/// One node of a dump with its children nested inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpedNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DumpedNode>,
}

impl DumpedNode {
    pub fn new(data: Value) -> Self {
        DumpedNode {
            id: None,
            data,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DumpedNode>) -> Self {
        self.children = children;
        self
    }

    /// Number of nodes in this record including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DumpedNode::node_count).sum::<usize>()
    }
}

fn close_last(stack: &mut Vec<(u32, DumpedNode)>, roots: &mut Vec<DumpedNode>) {
    if let Some((_, done)) = stack.pop() {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

impl<R: NodeRepository> Tree<R> {
    /// Exports `parent` and its descendants (or the whole forest) as nested
    /// records in sibling order.
    pub fn dump_bulk(
        &self,
        parent: Option<&TreeNode>,
        keep_ids: bool,
    ) -> Result<Vec<DumpedNode>, TreeError> {
        let nodes = self.view().get_tree(parent)?;
        let mut roots = Vec::new();
        let mut stack: Vec<(u32, DumpedNode)> = Vec::new();

        for node in nodes {
            while stack.last().is_some_and(|(depth, _)| *depth >= node.depth) {
                close_last(&mut stack, &mut roots);
            }
            let TreeNode { id, depth, data, .. } = node;
            stack.push((
                depth,
                DumpedNode {
                    id: keep_ids.then_some(id),
                    data,
                    children: Vec::new(),
                },
            ));
        }
        while !stack.is_empty() {
            close_last(&mut stack, &mut roots);
        }
        Ok(roots)
    }

    /// Recreates `records` as new roots, or as children of `parent`, in one
    /// atomic unit. Returns the ids of the created nodes in pre-order.
    ///
    /// With `keep_ids`, record ids are reused; a clash with an existing node
    /// fails with [`TreeError::NodeAlreadyExists`] and nothing is loaded.
    pub fn load_bulk(
        &mut self,
        records: &[DumpedNode],
        parent: Option<&TreeNode>,
        keep_ids: bool,
    ) -> Result<Vec<NodeId>, TreeError> {
        let ids = self.writer_atomic(|w| {
            let parent = match parent {
                Some(parent) => Some(w.view().reload(parent)?),
                None => None,
            };
            let mut ids = Vec::new();
            let mut stack: Vec<(Option<TreeNode>, &DumpedNode)> = records
                .iter()
                .rev()
                .map(|record| (parent.clone(), record))
                .collect();

            while let Some((under, record)) = stack.pop() {
                let mut input = NewNode::new(record.data.clone());
                if let (true, Some(id)) = (keep_ids, record.id) {
                    input = input.with_id(id);
                }
                let node = match &under {
                    Some(under) => w.add_child(under, input)?,
                    None => w.add_root(input)?,
                };
                ids.push(node.id);
                for child in record.children.iter().rev() {
                    stack.push((Some(node.clone()), child));
                }
            }
            Ok(ids)
        })?;
        tracing::info!(nodes = ids.len(), "loaded bulk records");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mptree_core::config::TreeConfig;
    use mptree_storage::InMemoryRepository;
    use serde_json::json;

    fn sample() -> Vec<DumpedNode> {
        vec![
            DumpedNode::new(json!({"name": "1"})).with_children(vec![
                DumpedNode::new(json!({"name": "1.1"})),
                DumpedNode::new(json!({"name": "1.2"}))
                    .with_children(vec![DumpedNode::new(json!({"name": "1.2.1"}))]),
            ]),
            DumpedNode::new(json!({"name": "2"})),
        ]
    }

    #[test]
    fn load_then_dump_preserves_shape() {
        let mut tree = Tree::new(InMemoryRepository::new(), &TreeConfig::default()).unwrap();
        let ids = tree.load_bulk(&sample(), None, false).unwrap();
        assert_eq!(ids.len(), 5);

        let dumped = tree.dump_bulk(None, false).unwrap();
        assert_eq!(dumped, sample());
        let paths: Vec<String> = tree
            .view()
            .get_tree(None)
            .unwrap()
            .into_iter()
            .map(|n| n.path)
            .collect();
        assert_eq!(
            paths,
            vec!["0001", "00010001", "00010002", "000100020001", "0002"]
        );
        assert!(tree.find_problems().unwrap().is_clean());
    }

    #[test]
    fn dump_subtree_with_ids() {
        let mut tree = Tree::new(InMemoryRepository::new(), &TreeConfig::default()).unwrap();
        tree.load_bulk(&sample(), None, false).unwrap();
        let branch = tree.get_by_path("00010002").unwrap().unwrap();

        let dumped = tree.dump_bulk(Some(&branch), true).unwrap();
        assert_eq!(dumped.len(), 1);
        assert_eq!(dumped[0].id, Some(branch.id));
        assert_eq!(dumped[0].node_count(), 2);
        assert_eq!(dumped[0].children[0].data["name"], "1.2.1");
    }

    #[test]
    fn reload_into_new_steplen() {
        let mut tree = Tree::new(InMemoryRepository::new(), &TreeConfig::default()).unwrap();
        tree.load_bulk(&sample(), None, false).unwrap();
        let dumped = tree.dump_bulk(None, true).unwrap();

        let config = TreeConfig {
            steplen: 2,
            ..TreeConfig::default()
        };
        let mut narrow = Tree::new(InMemoryRepository::new(), &config).unwrap();
        narrow.load_bulk(&dumped, None, true).unwrap();
        assert_eq!(narrow.dump_bulk(None, true).unwrap(), dumped);
        assert!(narrow.get_by_path("0102").unwrap().is_some());
    }

    #[test]
    fn id_clash_loads_nothing() {
        let mut tree = Tree::new(InMemoryRepository::new(), &TreeConfig::default()).unwrap();
        let existing = tree.add_root(json!({"name": "x"})).unwrap();
        let records = vec![
            DumpedNode::new(json!({"name": "fresh"})),
            DumpedNode {
                id: Some(existing.id),
                ..DumpedNode::new(json!({"name": "clash"}))
            },
        ];
        let err = tree.load_bulk(&records, None, true).unwrap_err();
        assert!(matches!(err, TreeError::NodeAlreadyExists { .. }));
        assert_eq!(tree.root_nodes().unwrap().len(), 1);
    }

    #[test]
    fn records_deserialize_without_optional_fields() {
        let records: Vec<DumpedNode> =
            serde_json::from_str(r#"[{"data": {"name": "a"}, "children": [{"data": null}]}, {}]"#)
                .unwrap();
        assert_eq!(records[0].node_count(), 2);
        assert_eq!(records[1].data, Value::Null);
    }
}
