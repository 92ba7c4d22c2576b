//! End-to-end CLI tests for the diff command.

use clonekit_lib::diff::{CloneDiffReport, DiffReport};
use clonekit_lib::model::{AlignmentRecord, GeneHits, GeneType, Hit};
use std::path::Path;
use tempfile::TempDir;

use crate::helpers::{
    alignment, arg, assert_failure_mentions, assert_success, clone_record, read_alignments,
    run_clonekit, untagged_header, write_alignments, write_clones,
};

fn with_v(record: AlignmentRecord, v: &str) -> AlignmentRecord {
    let hits = GeneHits::new()
        .with(GeneType::Variable, vec![Hit::new(v, 100.0)])
        .with(GeneType::Joining, record.hits.get(GeneType::Joining).to_vec());
    AlignmentRecord { hits, ..record }
}

#[test]
fn test_diff_classifies_records() {
    let dir = TempDir::new().unwrap();
    let first = write_alignments(
        &dir.path().join("first.alns"),
        &untagged_header(),
        &[alignment(0, "TGTA"), alignment(1, "TGTC"), alignment(2, "TGTG"), alignment(4, "TGTT")],
        5,
    );
    let second = write_alignments(
        &dir.path().join("second.alns"),
        &untagged_header(),
        &[
            alignment(1, "TGTC"),
            alignment(2, "TGTT"),
            alignment(3, "TGTA"),
            with_v(alignment(4, "TGTT"), "TRBV2"),
        ],
        5,
    );
    let json = dir.path().join("diff.json");
    let only_second = dir.path().join("only_second.alns");
    let diff_first = dir.path().join("diff_first.alns");

    assert_success(&run_clonekit(&[
        "diff",
        "--first",
        arg(&first),
        "--second",
        arg(&second),
        "--only-second",
        arg(&only_second),
        "--diff-first",
        arg(&diff_first),
        "--json-report",
        arg(&json),
    ]));

    let report: DiffReport = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report.only_first, 1);
    assert_eq!(report.only_second, 1);
    assert_eq!(report.same, 1);
    assert_eq!(report.different, 2);
    assert_eq!(report.junction_mismatches, 1);
    assert_eq!(report.v_hit_mismatches, 1);
    assert_eq!(report.j_hit_mismatches, 0);

    let ids = |path: &Path| -> Vec<u64> {
        read_alignments(path).iter().map(AlignmentRecord::min_read_id).collect()
    };
    assert_eq!(ids(only_second.as_path()), vec![3]);
    assert_eq!(ids(diff_first.as_path()), vec![2, 4]);
}

#[test]
fn test_diff_ignoring_junction_and_hits() {
    let dir = TempDir::new().unwrap();
    let first =
        write_alignments(&dir.path().join("a.alns"), &untagged_header(), &[alignment(0, "TGTA")], 1);
    let second = write_alignments(
        &dir.path().join("b.alns"),
        &untagged_header(),
        &[with_v(alignment(0, "TGTC"), "TRBV2")],
        1,
    );
    let json = dir.path().join("diff.json");

    assert_success(&run_clonekit(&[
        "diff",
        "--first",
        arg(&first),
        "--second",
        arg(&second),
        "--gene-feature",
        "none",
        "--top-hits-level",
        "0",
        "--json-report",
        arg(&json),
    ]));

    let report: DiffReport = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report.same, 1);
    assert_eq!(report.different, 0);
}

#[test]
fn test_diff_prints_report_without_report_options() {
    let dir = TempDir::new().unwrap();
    let first =
        write_alignments(&dir.path().join("a.alns"), &untagged_header(), &[alignment(0, "TGTA")], 1);
    let second =
        write_alignments(&dir.path().join("b.alns"), &untagged_header(), &[alignment(1, "TGTA")], 2);

    let output = run_clonekit(&["diff", "--first", arg(&first), "--second", arg(&second)]);
    assert_success(&output);

    let report: DiffReport = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report.only_first, 1);
    assert_eq!(report.only_second, 1);
}

#[test]
fn test_diff_rejects_unsorted_input() {
    let dir = TempDir::new().unwrap();
    let first = write_alignments(
        &dir.path().join("a.alns"),
        &untagged_header(),
        &[alignment(2, "TGTA"), alignment(1, "TGTA")],
        3,
    );
    let second =
        write_alignments(&dir.path().join("b.alns"), &untagged_header(), &[alignment(1, "TGTA")], 3);

    let output = run_clonekit(&["diff", "--first", arg(&first), "--second", arg(&second)]);
    assert_failure_mentions(&output, "sorted");
}

fn clone_diff(first: &Path, second: &Path, json: &Path, extra: &[&str]) -> CloneDiffReport {
    let mut args = vec!["diff", "--first", arg(first), "--second", arg(second)];
    args.extend_from_slice(extra);
    args.extend_from_slice(&["--json-report", arg(json)]);
    assert_success(&run_clonekit(&args));
    serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap()
}

#[test]
fn test_diff_clone_sets_by_clonal_sequence() {
    let dir = TempDir::new().unwrap();
    let first = write_clones(
        &dir.path().join("first.clns"),
        vec![
            clone_record(0, 10.0, "TGTA", "TRBV1", "TRBJ1"),
            clone_record(1, 6.0, "TGTC", "TRBV1", "TRBJ1"),
            clone_record(2, 4.0, "TGTG", "TRBV2", "TRBJ1"),
        ],
        20,
    );
    let second = write_clones(
        &dir.path().join("second.clns"),
        vec![
            clone_record(0, 5.0, "TGTA", "TRBV1", "TRBJ1"),
            clone_record(1, 5.0, "TGTG", "TRBV1", "TRBJ1"),
        ],
        10,
    );
    let json = dir.path().join("clones.json");

    let by_sequence = clone_diff(&first, &second, &json, &[]);
    assert_eq!(by_sequence.shared_clones, 2);
    assert_eq!((by_sequence.unique_clones_first, by_sequence.unique_clones_second), (1, 0));
    assert!((by_sequence.unique_reads_first - 6.0).abs() < 1e-9);
    assert!((by_sequence.unique_read_fraction_first - 0.3).abs() < 1e-9);

    let with_v = clone_diff(&first, &second, &json, &["--use-v"]);
    assert_eq!(with_v.shared_clones, 1);
    assert_eq!((with_v.unique_clones_first, with_v.unique_clones_second), (2, 1));
    assert!((with_v.unique_reads_second - 5.0).abs() < 1e-9);
}

#[test]
fn test_diff_clone_sets_rejects_alignment_outputs() {
    let dir = TempDir::new().unwrap();
    let clones = vec![clone_record(0, 1.0, "TGTA", "TRBV1", "TRBJ1")];
    let first = write_clones(&dir.path().join("first.clns"), clones.clone(), 1);
    let second = write_clones(&dir.path().join("second.clns"), clones, 1);
    let only_first = dir.path().join("only_first.alns");

    let result = run_clonekit(&[
        "diff",
        "--first",
        arg(&first),
        "--second",
        arg(&second),
        "--only-first",
        arg(&only_first),
    ]);
    assert_failure_mentions(&result, "require alignment files");
}
