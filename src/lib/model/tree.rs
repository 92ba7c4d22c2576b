//! Clonal lineage trees.

use serde::{Deserialize, Serialize};

/// A clone attached to a tree node, identified by the dataset it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeClone {
    /// Index into the header's dataset list.
    pub dataset: u32,
    pub clone_id: u64,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub node_id: u32,
    /// Parent node; `None` for the root.
    pub parent: Option<u32>,
    pub clones: Vec<TreeNodeClone>,
}

/// One lineage tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub tree_id: u64,
    pub nodes: Vec<TreeNode>,
}

impl TreeRecord {
    /// Total number of clone attachments over all nodes.
    #[must_use]
    pub fn clone_count(&self) -> usize {
        self.nodes.iter().map(|n| n.clones.len()).sum()
    }
}

/// Flattened (dataset, tree, node) row used for per-dataset exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeRow {
    pub dataset: u32,
    pub tree_id: u64,
    pub node_id: u32,
    pub clone_id: u64,
    pub count: f64,
}

impl TreeNodeRow {
    /// Flattens a tree into one row per attached clone.
    #[must_use]
    pub fn rows_of(tree: &TreeRecord) -> Vec<TreeNodeRow> {
        tree.nodes
            .iter()
            .flat_map(|node| {
                node.clones.iter().map(move |c| TreeNodeRow {
                    dataset: c.dataset,
                    tree_id: tree.tree_id,
                    node_id: node.node_id,
                    clone_id: c.clone_id,
                    count: c.count,
                })
            })
            .collect()
    }
}
