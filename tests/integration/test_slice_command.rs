//! End-to-end CLI tests for the slice command on clone and combined files.

use clonekit_lib::model::{AlignmentRecord, UNASSIGNED_CLONE};
use tempfile::TempDir;

use crate::helpers::{
    alignment, arg, assert_failure_mentions, assert_referential_integrity, assert_success,
    clone_record, open_clna, read_clones, run_clonekit, write_clna, write_clones,
};

fn assigned(read_id: u64, clone_index: i64) -> AlignmentRecord {
    alignment(read_id, "TGTGCC").with_clone_index(clone_index)
}

#[test]
fn test_slice_clna_relinks_alignments() {
    let dir = TempDir::new().unwrap();
    let clones = vec![
        clone_record(0, 3.0, "TGTAAA", "TRBV1", "TRBJ1"),
        clone_record(1, 1.0, "TGTCCC", "TRBV2", "TRBJ2"),
        clone_record(2, 2.0, "TGTGGG", "IGHV1", "IGHJ1"),
    ];
    let alignments = vec![
        assigned(0, 0),
        assigned(1, 2),
        assigned(2, UNASSIGNED_CLONE),
        assigned(3, 0),
        assigned(4, 1),
        assigned(5, 2),
        assigned(6, 0),
    ];
    let input = write_clna(&dir.path().join("in.clna"), clones, alignments, 7);
    let output = dir.path().join("out.clna");

    assert_success(&run_clonekit(&["slice", "-i", arg(&input), "-o", arg(&output), "--id", "2,0"]));

    let reader = open_clna(&output);
    assert_eq!(reader.number_of_clones(), 2);
    assert_eq!(reader.number_of_alignments(), 5);
    assert_eq!(reader.footer().processed_reads, 7);
    assert_referential_integrity(&reader);

    let clones = reader.read_clone_set().unwrap();
    assert_eq!(clones.clones()[0].id, 0);
    assert_eq!(clones.clones()[0].junction.as_deref(), Some("TGTGGG"));
    assert_eq!(clones.clones()[1].junction.as_deref(), Some("TGTAAA"));
    assert!((clones.total_count() - 5.0).abs() < 1e-9);

    // Old clone 2 owned reads 1 and 5, now clone 0.
    let first: Vec<u64> = reader
        .alignments_of_clone(0)
        .unwrap()
        .map(|a| a.unwrap().min_read_id())
        .collect();
    assert_eq!(first, vec![1, 5]);
    let indices: Vec<u64> =
        reader.alignments().unwrap().map(|a| a.unwrap().alignment_index).collect();
    assert_eq!(indices, (0..5).collect::<Vec<_>>());
    assert_eq!(reader.alignments_of_clone(UNASSIGNED_CLONE).unwrap().count(), 0);
}

#[test]
fn test_slice_clones_by_position() {
    let dir = TempDir::new().unwrap();
    let input = write_clones(
        &dir.path().join("in.clns"),
        vec![
            clone_record(0, 5.0, "TGTAAA", "TRBV1", "TRBJ1"),
            clone_record(1, 15.0, "TGTCCC", "TRBV2", "TRBJ2"),
        ],
        20,
    );
    let output = dir.path().join("out.clns");

    assert_success(&run_clonekit(&["slice", "-i", arg(&input), "-o", arg(&output), "--id", "1"]));

    let clones = read_clones(&output);
    assert_eq!(clones.len(), 1);
    assert_eq!(clones[0].id, 0);
    assert_eq!(clones[0].junction.as_deref(), Some("TGTCCC"));
    assert!((clones[0].fraction - 1.0).abs() < 1e-9);
}

#[test]
fn test_slice_clones_rejects_unknown_id() {
    let dir = TempDir::new().unwrap();
    let input = write_clones(
        &dir.path().join("in.clns"),
        vec![clone_record(0, 5.0, "TGTAAA", "TRBV1", "TRBJ1")],
        5,
    );
    let output = dir.path().join("out.clns");

    let result = run_clonekit(&["slice", "-i", arg(&input), "-o", arg(&output), "--id", "0,3"]);
    assert_failure_mentions(&result, "3");
}

#[test]
fn test_slice_requires_matching_extension() {
    let dir = TempDir::new().unwrap();
    let input = write_clones(
        &dir.path().join("in.clns"),
        vec![clone_record(0, 5.0, "TGTAAA", "TRBV1", "TRBJ1")],
        5,
    );
    let output = dir.path().join("out.alns");

    let result = run_clonekit(&["slice", "-i", arg(&input), "-o", arg(&output), "--id", "0"]);
    assert!(!result.status.success());
}
