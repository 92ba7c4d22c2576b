//! End-to-end CLI tests for the chain-usage command.

use clonekit_lib::aggregate::ChainUsageRow;
use clonekit_lib::model::AlignmentRecord;
use fgoxide::io::DelimFile;
use tempfile::TempDir;

use crate::helpers::{
    arg, assert_failure_mentions, assert_success, clone_record, run_clonekit, untagged_header,
    vj_hits, write_alignments, write_clones, write_trees,
};

fn with_genes(read_id: u64, v: &str, j: &str, junction: &str) -> AlignmentRecord {
    AlignmentRecord::new(read_id, vec!["ACGT".to_string()], vj_hits(v, j)).with_junction(junction)
}

#[test]
fn test_chain_usage_of_alignments() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        with_genes(0, "TRBV1", "TRBJ1", "TGTGCC"),
        with_genes(1, "TRBV2", "TRBJ2", "TGTGC"),
        with_genes(2, "IGHV1", "IGHJ1", "TGTTAA"),
        with_genes(3, "TRBV1", "IGHJ1", "TGTGCC"),
    ];
    let input = write_alignments(&dir.path().join("in.alns"), &untagged_header(), &records, 4);
    let output = dir.path().join("usage.tsv");

    assert_success(&run_clonekit(&["chain-usage", "-i", arg(&input), "-o", arg(&output), "-t", "2"]));

    let rows: Vec<ChainUsageRow> = DelimFile::default().read_tsv(&output).unwrap();
    assert_eq!(rows.len(), 3);

    let trb = rows.iter().find(|r| r.chain == "TRB").expect("TRB row");
    assert_eq!(trb.total, 2);
    assert_eq!(trb.productive, 1);
    assert_eq!(trb.out_of_frame, 1);
    assert_eq!(trb.non_functional, 1);
    assert!((trb.fraction - 0.5).abs() < 1e-9);

    let igh = rows.iter().find(|r| r.chain == "IGH").expect("IGH row");
    assert_eq!(igh.total, 1);
    assert_eq!(igh.has_stops, 1);
    assert_eq!(igh.productive, 0);

    let chimeras = rows.iter().find(|r| r.chain == "chimeras").expect("chimera row");
    assert_eq!(chimeras.total, 1);
}

#[test]
fn test_chain_usage_of_several_clone_files() {
    let dir = TempDir::new().unwrap();
    let a = write_clones(
        &dir.path().join("a.clns"),
        vec![
            clone_record(0, 10.0, "TGTGCC", "TRBV1", "TRBJ1"),
            clone_record(1, 5.0, "TGTGGG", "TRBV2", "TRBJ1"),
        ],
        15,
    );
    let b = write_clones(
        &dir.path().join("b.clns"),
        vec![clone_record(0, 3.0, "TGTAAA", "IGHV1", "IGHJ1")],
        3,
    );
    let output = dir.path().join("usage.tsv");
    let json = dir.path().join("usage.json");

    assert_success(&run_clonekit(&[
        "chain-usage",
        "-i",
        arg(&a),
        arg(&b),
        "-o",
        arg(&output),
        "--json-report",
        arg(&json),
    ]));

    let rows: Vec<ChainUsageRow> = DelimFile::default().read_tsv(&output).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows.iter().filter(|r| r.file == arg(&a)).count(), 2);
    let igh = rows.iter().find(|r| r.file == arg(&b) && r.chain == "IGH").expect("IGH row");
    assert_eq!(igh.total, 1);
    assert!((igh.fraction - 1.0).abs() < 1e-9);

    let by_file: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(by_file[arg(&a)]["total"], 2);
}

#[test]
fn test_chain_usage_rejects_tree_files() {
    let dir = TempDir::new().unwrap();
    let input = write_trees(&dir.path().join("in.trees"), &["d0"], &[]);
    let output = dir.path().join("usage.tsv");

    let result = run_clonekit(&["chain-usage", "-i", arg(&input), "-o", arg(&output)]);
    assert_failure_mentions(&result, "trees");
}
