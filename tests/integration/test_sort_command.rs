//! End-to-end CLI tests for the sort command.

use clonekit_lib::model::{AlignmentRecord, TagTuple};
use clonekit_lib::record_io::RecordReader;
use tempfile::TempDir;

use crate::helpers::{
    alignment, arg, assert_success, clone_record, read_alignments, read_clones, run_clonekit,
    tagged_header, untagged_header, write_alignments, write_clones,
};

fn shuffled(n: u64) -> Vec<AlignmentRecord> {
    // 37 is coprime with every n used here, so this visits each id once.
    (0..n).map(|i| (i * 37) % n).map(|id| alignment(id, "TGTGCC")).collect()
}

#[test]
fn test_sort_by_read_id_with_spilling() {
    let dir = TempDir::new().unwrap();
    let input = write_alignments(&dir.path().join("in.alns"), &untagged_header(), &shuffled(500), 500);
    let output = dir.path().join("sorted.alns");

    // A tiny memory budget forces several spill chunks.
    assert_success(&run_clonekit(&[
        "sort",
        "-i",
        arg(&input),
        "-o",
        arg(&output),
        "--order",
        "read-id",
        "--max-memory",
        "1K",
        "-T",
        arg(dir.path()),
    ]));

    let ids: Vec<u64> = read_alignments(&output).iter().map(AlignmentRecord::min_read_id).collect();
    assert_eq!(ids, (0..500).collect::<Vec<_>>());
    assert_eq!(RecordReader::<AlignmentRecord>::open(&output).unwrap().processed_reads(), 500);
}

#[test]
fn test_sort_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = write_alignments(&dir.path().join("in.alns"), &untagged_header(), &shuffled(64), 64);
    let once = dir.path().join("once.alns");
    let twice = dir.path().join("twice.alns");

    assert_success(&run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&once)]));
    assert_success(&run_clonekit(&["sort", "-i", arg(&once), "-o", arg(&twice)]));

    assert_eq!(read_alignments(&once), read_alignments(&twice));
}

#[test]
fn test_sort_by_tags_records_sorting_level() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        alignment(0, "TGT").with_tags(TagTuple::new(["C2", "U1"])),
        alignment(1, "TGT").with_tags(TagTuple::new(["C1", "U2"])),
        alignment(2, "TGT").with_tags(TagTuple::new(["C1", "U1"])),
        alignment(3, "TGT").with_tags(TagTuple::new(["C2", "U1"])),
    ];
    let input = write_alignments(&dir.path().join("in.alns"), &tagged_header(), &records, 4);
    let output = dir.path().join("sorted.alns");

    assert_success(&run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&output), "--order", "tags"]));

    let reader = RecordReader::<AlignmentRecord>::open(&output).unwrap();
    assert_eq!(reader.header().tags.sorting_level(), 2);
    let ids: Vec<u64> = reader.read_all().unwrap().iter().map(AlignmentRecord::min_read_id).collect();
    assert_eq!(ids, vec![2, 1, 0, 3]);
}

#[test]
fn test_sort_clones_by_abundance() {
    let dir = TempDir::new().unwrap();
    let input = write_clones(
        &dir.path().join("in.clns"),
        vec![
            clone_record(0, 1.0, "TGTAAA", "TRBV1", "TRBJ1"),
            clone_record(1, 9.0, "TGTCCC", "TRBV2", "TRBJ2"),
            clone_record(2, 9.0, "TGTGGG", "IGHV1", "IGHJ1"),
            clone_record(3, 4.0, "TGTTTT", "TRBV1", "TRBJ2"),
        ],
        23,
    );
    let output = dir.path().join("sorted.clns");

    assert_success(&run_clonekit(&["sort", "-i", arg(&input), "-o", arg(&output)]));

    let clones = read_clones(&output);
    let junctions: Vec<&str> = clones.iter().filter_map(|c| c.junction.as_deref()).collect();
    assert_eq!(junctions, vec!["TGTCCC", "TGTGGG", "TGTTTT", "TGTAAA"]);
    let ids: Vec<u64> = clones.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}
