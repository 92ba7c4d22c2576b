//! End-to-end CLI tests for tree export and tree slicing.

use clonekit_lib::model::{TreeNode, TreeNodeClone, TreeNodeRow, TreeRecord};
use clonekit_lib::record_io::RecordReader;
use fgoxide::io::DelimFile;
use tempfile::TempDir;

use crate::helpers::{arg, assert_success, run_clonekit, write_trees};

fn node(node_id: u32, parent: Option<u32>, clones: &[(u32, u64, f64)]) -> TreeNode {
    TreeNode {
        node_id,
        parent,
        clones: clones
            .iter()
            .map(|&(dataset, clone_id, count)| TreeNodeClone { dataset, clone_id, count })
            .collect(),
    }
}

fn trees() -> Vec<TreeRecord> {
    vec![
        TreeRecord {
            tree_id: 7,
            nodes: vec![node(0, None, &[(1, 4, 2.0)]), node(1, Some(0), &[(0, 9, 1.0), (1, 2, 3.0)])],
        },
        TreeRecord { tree_id: 3, nodes: vec![node(0, None, &[(0, 5, 6.0)])] },
    ]
}

#[test]
fn test_export_tree_nodes_per_dataset() {
    let dir = TempDir::new().unwrap();
    let input = write_trees(&dir.path().join("in.trees"), &["spleen", "blood"], &trees());
    let prefix = dir.path().join("nodes");

    assert_success(&run_clonekit(&["export-tree-nodes", "-i", arg(&input), "-p", arg(&prefix)]));

    let spleen: Vec<TreeNodeRow> =
        DelimFile::default().read_tsv(&dir.path().join("nodes.spleen.tsv")).unwrap();
    let keys: Vec<(u64, u32, u64)> = spleen.iter().map(|r| (r.tree_id, r.node_id, r.clone_id)).collect();
    assert_eq!(keys, vec![(3, 0, 5), (7, 1, 9)]);

    let blood: Vec<TreeNodeRow> =
        DelimFile::default().read_tsv(&dir.path().join("nodes.blood.tsv")).unwrap();
    let keys: Vec<(u64, u32, u64)> = blood.iter().map(|r| (r.tree_id, r.node_id, r.clone_id)).collect();
    assert_eq!(keys, vec![(7, 0, 4), (7, 1, 2)]);
    assert!(blood.iter().all(|r| r.dataset == 1));
}

#[test]
fn test_slice_trees_by_id() {
    let dir = TempDir::new().unwrap();
    let input = write_trees(&dir.path().join("in.trees"), &["spleen", "blood"], &trees());
    let output = dir.path().join("out.trees");

    assert_success(&run_clonekit(&["slice", "-i", arg(&input), "-o", arg(&output), "--id", "3"]));

    let reader = RecordReader::<TreeRecord>::open(&output).unwrap();
    assert_eq!(reader.header().datasets, vec!["spleen".to_string(), "blood".to_string()]);
    let kept = reader.read_all().unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].tree_id, 3);
}
