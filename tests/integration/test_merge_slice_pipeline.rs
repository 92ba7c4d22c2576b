//! Merge followed by slice, through the binary and through the library.

use clonekit_lib::header::Provenance;
use clonekit_lib::merge::merge_files;
use clonekit_lib::model::AlignmentRecord;
use clonekit_lib::record_io::RecordReader;
use tempfile::TempDir;

use crate::helpers::{
    alignment, arg, assert_success, assert_unique_read_ids, clone_record, read_alignments,
    read_clones, run_clonekit, untagged_header, write_alignments, write_clones,
    write_sequential_alignments,
};

fn provenance() -> Provenance {
    Provenance::new("test", "clonekit test")
}

#[test]
fn test_merge_then_slice_pipeline() {
    let dir = TempDir::new().unwrap();
    let a = write_sequential_alignments(&dir.path().join("a.alns"), 100, "A");
    let b = write_sequential_alignments(&dir.path().join("b.alns"), 100, "B");
    let merged = dir.path().join("merged.alns");

    assert_success(&run_clonekit(&["merge", "-i", arg(&a), arg(&b), "-o", arg(&merged)]));

    let records = read_alignments(&merged);
    assert_eq!(records.len(), 200);
    assert_unique_read_ids(&records);
    assert_eq!(records[100].read_ids, vec![100]);
    assert_eq!(records[100].junction.as_deref(), Some("B0000"));
    let reader = RecordReader::<AlignmentRecord>::open(&merged).unwrap();
    assert_eq!(reader.processed_reads(), 200);
    assert!(reader.header().steps.iter().any(|s| s.command == "merge"));

    let sliced = dir.path().join("sliced.alns");
    assert_success(&run_clonekit(&[
        "slice",
        "-i",
        arg(&merged),
        "-o",
        arg(&sliced),
        "--id",
        "199,0",
    ]));

    let records = read_alignments(&sliced);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].read_ids, vec![199]);
    assert_eq!(records[0].junction.as_deref(), Some("B0099"));
    assert_eq!(records[1].read_ids, vec![0]);
    assert_eq!(records[1].junction.as_deref(), Some("A0000"));
    assert_eq!(records[0].alignment_index, 0);
    assert_eq!(records[1].alignment_index, 1);
    assert_eq!(RecordReader::<AlignmentRecord>::open(&sliced).unwrap().processed_reads(), 200);
}

#[test]
fn test_merge_offsets_by_processed_reads_not_records() {
    let dir = TempDir::new().unwrap();
    // 3 records out of 10 processed reads: the next input's ids start at 10.
    let a = write_alignments(
        &dir.path().join("a.alns"),
        &untagged_header(),
        &[alignment(1, "TGT"), alignment(4, "TGC"), alignment(9, "TGA")],
        10,
    );
    let b = write_alignments(
        &dir.path().join("b.alns"),
        &untagged_header(),
        &[alignment(0, "TTT"), alignment(2, "TTC")],
        5,
    );
    let merged = dir.path().join("merged.alns");

    let report = merge_files(&[a, b], &merged, &provenance()).unwrap();
    assert_eq!(report.input_files, 2);
    assert_eq!(report.records_written, 5);
    assert_eq!(report.processed_reads, 15);

    let ids: Vec<u64> = read_alignments(&merged).iter().map(AlignmentRecord::min_read_id).collect();
    assert_eq!(ids, vec![1, 4, 9, 10, 12]);
}

#[test]
fn test_merge_clone_files_renumbers_and_recomputes_fractions() {
    let dir = TempDir::new().unwrap();
    let a = write_clones(
        &dir.path().join("a.clns"),
        vec![clone_record(0, 30.0, "TGTGCC", "TRBV1", "TRBJ1")],
        40,
    );
    let b = write_clones(
        &dir.path().join("b.clns"),
        vec![
            clone_record(0, 10.0, "TGTAAA", "TRBV2", "TRBJ2"),
            clone_record(1, 60.0, "TGTCCC", "IGHV1", "IGHJ1"),
        ],
        90,
    );
    let merged = dir.path().join("merged.clns");

    let report = merge_files(&[a, b], &merged, &provenance()).unwrap();
    assert_eq!(report.records_written, 3);
    assert_eq!(report.processed_reads, 130);

    let clones = read_clones(&merged);
    let ids: Vec<u64> = clones.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    let total: f64 = clones.iter().map(|c| c.fraction).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!((clones[2].fraction - 0.6).abs() < 1e-9);
}

#[test]
fn test_slice_id_file_through_binary() {
    let dir = TempDir::new().unwrap();
    let input = write_sequential_alignments(&dir.path().join("in.alns"), 20, "J");
    let ids = dir.path().join("ids.txt");
    std::fs::write(&ids, "# wanted reads\n7\n\n3\n").unwrap();
    let output = dir.path().join("out.alns");

    assert_success(&run_clonekit(&[
        "slice",
        "-i",
        arg(&input),
        "-o",
        arg(&output),
        "--id-file",
        arg(&ids),
    ]));

    let read_ids: Vec<u64> =
        read_alignments(&output).iter().map(AlignmentRecord::min_read_id).collect();
    assert_eq!(read_ids, vec![7, 3]);
}
