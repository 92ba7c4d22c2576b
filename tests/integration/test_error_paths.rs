//! Error path integration tests.
//!
//! These tests verify that error conditions are handled correctly,
//! including missing files, unfinished files, mixed inputs and inconsistent streams.

use clonekit_lib::ClonekitError;
use clonekit_lib::grouper::KeyGrouper;
use clonekit_lib::header::Provenance;
use clonekit_lib::merge::merge_files;
use clonekit_lib::model::{AlignmentRecord, CloneRecord};
use clonekit_lib::record_io::{RecordReader, RecordWriter};
use tempfile::TempDir;

use crate::helpers::{
    alignment, arg, assert_absent, assert_clonekit_error, assert_failure_mentions,
    clone_record, run_clonekit, tagged_header, untagged_header, write_alignments, write_clones,
    write_sequential_alignments,
};

// ==================== Command line ====================

#[test]
fn test_missing_input_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.alns");
    let output = dir.path().join("out.alns");

    let result = run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&output)]);
    assert!(!result.status.success());
    assert_absent(&output);
}

#[test]
fn test_slice_requires_ids() {
    let dir = TempDir::new().unwrap();
    let input = write_sequential_alignments(&dir.path().join("in.alns"), 3, "J");
    let output = dir.path().join("out.alns");

    let result = run_clonekit(&["slice", "-i", arg(&input), "-o", arg(&output)]);
    assert!(!result.status.success());
}

#[test]
fn test_output_may_not_overwrite_input() {
    let dir = TempDir::new().unwrap();
    let input = write_sequential_alignments(&dir.path().join("in.alns"), 3, "J");

    let result = run_clonekit(&["merge", "-i", arg(&input), "-o", arg(&input)]);
    assert!(!result.status.success());
    assert_eq!(RecordReader::<AlignmentRecord>::open(&input).unwrap().read_all().unwrap().len(), 3);
}

// ==================== File structure ====================

#[test]
fn test_unfinished_file_is_rejected_by_commands() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("partial.alns");
    let mut writer = RecordWriter::<AlignmentRecord>::create(&input, &untagged_header()).unwrap();
    writer.write(&alignment(0, "TGT")).unwrap();
    drop(writer);

    let err = RecordReader::<AlignmentRecord>::open(&input).err().unwrap();
    assert_clonekit_error(&err, |e| matches!(e, ClonekitError::UnfinishedFile { .. }));

    let output = dir.path().join("out.alns");
    let result = run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&output)]);
    assert_failure_mentions(&result, "unfinished");
}

#[test]
fn test_wrong_file_type_is_rejected() {
    let dir = TempDir::new().unwrap();
    let clones = write_clones(
        &dir.path().join("in.clns"),
        vec![clone_record(0, 1.0, "TGT", "TRBV1", "TRBJ1")],
        1,
    );
    // Same bytes under an alignment extension.
    let renamed = dir.path().join("renamed.alns");
    std::fs::copy(&clones, &renamed).unwrap();

    let err = RecordReader::<AlignmentRecord>::open(&renamed).err().unwrap();
    assert_clonekit_error(&err, |e| matches!(e, ClonekitError::WrongFileType { .. }));
    assert!(RecordReader::<CloneRecord>::open(&renamed).is_ok());
}

#[test]
fn test_merge_rejects_mixed_kinds() {
    let dir = TempDir::new().unwrap();
    let alignments = write_sequential_alignments(&dir.path().join("a.alns"), 2, "J");
    let clones = write_clones(
        &dir.path().join("b.clns"),
        vec![clone_record(0, 1.0, "TGT", "TRBV1", "TRBJ1")],
        1,
    );
    let output = dir.path().join("out.alns");

    let err = merge_files(&[alignments, clones], &output, &Provenance::default()).unwrap_err();
    assert_clonekit_error(&err, |e| matches!(e, ClonekitError::WrongFileType { .. }));
}

#[test]
fn test_merge_rejects_different_tag_schemas() {
    let dir = TempDir::new().unwrap();
    let plain = write_sequential_alignments(&dir.path().join("a.alns"), 2, "J");
    let tagged = write_alignments(&dir.path().join("b.alns"), &tagged_header(), &[], 0);
    let output = dir.path().join("out.alns");

    let err = merge_files(&[plain, tagged], &output, &Provenance::default()).unwrap_err();
    assert_clonekit_error(&err, |e| matches!(e, ClonekitError::IncompatibleInputs { .. }));
}

// ==================== Stream consistency ====================

#[test]
fn test_grouper_detects_reappearing_key() {
    let records = [1u64, 2, 1].map(|k| Ok::<_, anyhow::Error>(alignment(k, "TGT")));
    let grouper = KeyGrouper::new(records.into_iter(), |r: &AlignmentRecord| Ok(r.min_read_id()));

    let err = grouper.collect_groups().unwrap_err();
    assert_clonekit_error(&err, ClonekitError::is_consistency);
}
