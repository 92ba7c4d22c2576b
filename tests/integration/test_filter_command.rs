//! End-to-end CLI tests for the filter command.

use clonekit_lib::filter::FilterReport;
use clonekit_lib::model::{AlignmentRecord, GeneHits, GeneType, Hit};
use clonekit_lib::record_io::RecordReader;
use fgoxide::io::DelimFile;
use tempfile::TempDir;

use crate::helpers::{
    alignment, arg, assert_success, read_alignments, run_clonekit, untagged_header, vj_hits,
    write_alignments,
};

fn mixed_alignments() -> Vec<AlignmentRecord> {
    vec![
        alignment(0, "TGTGCC"),
        AlignmentRecord::new(1, vec!["ACGT".to_string()], vj_hits("TRBV2", "TRBJ2")),
        AlignmentRecord::new(2, vec!["ACGT".to_string()], vj_hits("IGHV1", "IGHJ1"))
            .with_junction("TGTAAA"),
        alignment(3, "TGTGGG"),
        AlignmentRecord::new(
            4,
            vec!["ACGT".to_string()],
            GeneHits::new().with(GeneType::Joining, vec![Hit::new("TRBJ1", 40.0)]),
        )
        .with_junction("TGTCCC"),
    ]
}

fn ids(records: &[AlignmentRecord]) -> Vec<u64> {
    records.iter().map(AlignmentRecord::min_read_id).collect()
}

#[test]
fn test_filter_by_chain_and_junction() {
    let dir = TempDir::new().unwrap();
    let input = write_alignments(&dir.path().join("in.alns"), &untagged_header(), &mixed_alignments(), 8);
    let output = dir.path().join("out.alns");
    let report_path = dir.path().join("filter.json");

    assert_success(&run_clonekit(&[
        "filter",
        "-i",
        arg(&input),
        "-o",
        arg(&output),
        "--chains",
        "TRB",
        "--contains-junction",
        "--json-report",
        arg(&report_path),
    ]));

    assert_eq!(ids(&read_alignments(&output)), vec![0, 3, 4]);
    assert_eq!(RecordReader::<AlignmentRecord>::open(&output).unwrap().processed_reads(), 8);

    let report: FilterReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report.total, 5);
    assert_eq!(report.passed, 3);
    assert_eq!(report.wrong_chain, 1);
    assert_eq!(report.no_junction, 1);
}

#[test]
fn test_filter_by_read_ids_with_limit() {
    let dir = TempDir::new().unwrap();
    let input = write_alignments(&dir.path().join("in.alns"), &untagged_header(), &mixed_alignments(), 5);
    let read_ids = dir.path().join("ids.txt");
    std::fs::write(&read_ids, "4\n1\n2\n").unwrap();
    let output = dir.path().join("out.alns");
    let report_path = dir.path().join("filter.tsv");

    assert_success(&run_clonekit(&[
        "filter",
        "-i",
        arg(&input),
        "-o",
        arg(&output),
        "--read-ids-file",
        arg(&read_ids),
        "--limit",
        "2",
        "--report",
        arg(&report_path),
    ]));

    assert_eq!(ids(&read_alignments(&output)), vec![1, 2]);

    let rows: Vec<clonekit_lib::report::ReportRow> = DelimFile::default().read_tsv(&report_path).unwrap();
    let passed = rows.iter().find(|r| r.field == "passed").expect("passed row");
    assert_eq!(passed.value, "2");
    let limit = rows.iter().find(|r| r.field == "limit_reached").expect("limit row");
    assert_eq!(limit.value, "true");
}

#[test]
fn test_filter_without_predicates_copies_everything() {
    let dir = TempDir::new().unwrap();
    let input = write_alignments(&dir.path().join("in.alns"), &untagged_header(), &mixed_alignments(), 5);
    let output = dir.path().join("out.alns");

    assert_success(&run_clonekit(&["filter", "-i", arg(&input), "-o", arg(&output)]));

    assert_eq!(read_alignments(&output), read_alignments(&input));
}
