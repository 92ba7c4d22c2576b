//! End-to-end CLI tests for tag sorting followed by partial assembly.

use clonekit_lib::model::{AlignmentRecord, GeneType};
use clonekit_lib::overlap::OverlapReport;
use clonekit_lib::record_io::RecordReader;
use std::path::Path;
use tempfile::TempDir;

use crate::helpers::{
    arg, assert_failure_mentions, assert_success, left_part, right_part, run_clonekit,
    tagged_header, write_alignments,
};

const LEFT: &str = "GGGGACGTACGTTTACCAGT";
const RIGHT: &str = "ACGTTTACCAGTCCCCAAAA";
const MERGED: &str = "GGGGACGTACGTTTACCAGTCCCCAAAA";

fn unsorted_molecules() -> Vec<AlignmentRecord> {
    vec![
        right_part(0, RIGHT, "C2", "U1"),
        left_part(1, LEFT, "C1", "U1"),
        left_part(2, LEFT, "C1", "U2"),
        right_part(3, RIGHT, "C1", "U1"),
    ]
}

#[test]
fn test_sort_then_assemble_partial_per_molecule() {
    let dir = TempDir::new().unwrap();
    let input =
        write_alignments(&dir.path().join("raw.alns"), &tagged_header(), &unsorted_molecules(), 4);
    let sorted = dir.path().join("sorted.alns");
    let output = dir.path().join("assembled.alns");
    let json = dir.path().join("overlap.json");

    assert_success(&run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&sorted), "--order", "tags"]));
    assert_success(&run_clonekit(&[
        "assemble-partial",
        "-i",
        arg(&sorted),
        "-o",
        arg(&output),
        "--k-value",
        "4",
        "--json-report",
        arg(&json),
    ]));

    let report: OverlapReport =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report.overlapped, 1);
    assert_eq!(report.partial_as_is, 2);
    assert_eq!(report.total_written, 3);

    let reader = RecordReader::<AlignmentRecord>::open(&output).unwrap();
    assert_eq!(reader.processed_reads(), 3);
    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 3);
    let merged = records.iter().find(|r| r.read_ids.len() == 2).expect("merged record");
    assert_eq!(merged.targets, vec![MERGED.to_string()]);
    assert_eq!(merged.read_ids, vec![1, 3]);
    assert!(merged.hits.best(GeneType::Variable).is_some());
    assert!(merged.hits.best(GeneType::Joining).is_some());
}

#[test]
fn test_assemble_partial_cell_level_crosses_molecules() {
    let dir = TempDir::new().unwrap();
    let records = vec![left_part(0, LEFT, "C1", "U1"), right_part(1, RIGHT, "C1", "U9")];
    let input = write_alignments(&dir.path().join("raw.alns"), &tagged_header(), &records, 2);
    let sorted = dir.path().join("sorted.alns");
    let per_molecule = dir.path().join("molecule.alns");
    let per_cell = dir.path().join("cell.alns");

    assert_success(&run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&sorted), "--order", "tags"]));
    assert_success(&run_clonekit(&[
        "assemble-partial",
        "-i",
        arg(&sorted),
        "-o",
        arg(&per_molecule),
        "--k-value",
        "4",
    ]));
    assert_success(&run_clonekit(&[
        "assemble-partial",
        "-i",
        arg(&sorted),
        "-o",
        arg(&per_cell),
        "--k-value",
        "4",
        "--cell-level",
    ]));

    let count = |path: &Path| RecordReader::<AlignmentRecord>::open(path).unwrap().read_all().unwrap().len();
    assert_eq!(count(per_molecule.as_path()), 2);
    assert_eq!(count(per_cell.as_path()), 1);
}

#[test]
fn test_assemble_partial_requires_tag_sorted_input() {
    let dir = TempDir::new().unwrap();
    let input =
        write_alignments(&dir.path().join("raw.alns"), &tagged_header(), &unsorted_molecules(), 4);
    let output = dir.path().join("assembled.alns");

    let result = run_clonekit(&["assemble-partial", "-i", arg(&input), "-o", arg(&output)]);
    assert_failure_mentions(&result, "sort --order tags");
}

#[test]
fn test_assemble_partial_rejects_invalid_k() {
    let dir = TempDir::new().unwrap();
    let input =
        write_alignments(&dir.path().join("raw.alns"), &tagged_header(), &unsorted_molecules(), 4);
    let output = dir.path().join("assembled.alns");

    let result =
        run_clonekit(&["assemble-partial", "-i", arg(&input), "-o", arg(&output), "--k-value", "40"]);
    assert!(!result.status.success());
}
