//! Builders for small record files used by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use clonekit_lib::header::{Footer, Header};
use clonekit_lib::model::{
    AlignmentRecord, CloneRecord, CloneSet, GeneCatalog, GeneHits, GeneType, Hit, TagInfo,
    TagKind, TagTuple, TagsInfo, TreeRecord,
};
use clonekit_lib::record_io::{ClnaReader, ClnaWriter, RecordReader, RecordWriter};
use clonekit_lib::sort::ExternalSorter;

/// Every gene referenced by the generated records.
pub const GENES: [&str; 8] =
    ["TRBV1", "TRBV2", "TRBJ1", "TRBJ2", "TRBC1", "IGHV1", "IGHJ1", "IGHC"];

/// Header with the shared gene catalog and no tags.
pub fn untagged_header() -> Header {
    Header::new(TagsInfo::none(), GeneCatalog::new(GENES))
}

/// Header with a cell tag followed by a molecule tag, not yet tag sorted.
pub fn tagged_header() -> Header {
    let tags = TagsInfo::new(vec![
        TagInfo::new("CELL", TagKind::Cell),
        TagInfo::new("UMI", TagKind::Molecule),
    ])
    .expect("valid tag schema");
    Header::new(tags, GeneCatalog::new(GENES))
}

/// Hits with a single V and a single J gene.
pub fn vj_hits(v: &str, j: &str) -> GeneHits {
    GeneHits::new()
        .with(GeneType::Variable, vec![Hit::new(v, 100.0)])
        .with(GeneType::Joining, vec![Hit::new(j, 50.0)])
}

/// A complete TRB alignment with a junction.
pub fn alignment(read_id: u64, junction: &str) -> AlignmentRecord {
    AlignmentRecord::new(read_id, vec![format!("ACGT{junction}ACGT")], vj_hits("TRBV1", "TRBJ1"))
        .with_junction(junction)
}

/// Alignment covering only the V side of a molecule.
pub fn left_part(read_id: u64, target: &str, cell: &str, umi: &str) -> AlignmentRecord {
    let hits = GeneHits::new().with(GeneType::Variable, vec![Hit::new("TRBV1", 100.0)]);
    AlignmentRecord::new(read_id, vec![target.to_string()], hits)
        .with_tags(TagTuple::new([cell, umi]))
}

/// Alignment covering only the J side of a molecule.
pub fn right_part(read_id: u64, target: &str, cell: &str, umi: &str) -> AlignmentRecord {
    let hits = GeneHits::new().with(GeneType::Joining, vec![Hit::new("TRBJ1", 50.0)]);
    AlignmentRecord::new(read_id, vec![target.to_string()], hits)
        .with_tags(TagTuple::new([cell, umi]))
}

pub fn clone_record(id: u64, count: f64, junction: &str, v: &str, j: &str) -> CloneRecord {
    CloneRecord::new(id, count, vec![junction.to_string()], vj_hits(v, j)).with_junction(junction)
}

/// Writes a finished alignment file declaring `processed_reads`.
pub fn write_alignments(
    path: &Path,
    header: &Header,
    records: &[AlignmentRecord],
    processed_reads: u64,
) -> PathBuf {
    let mut writer =
        RecordWriter::<AlignmentRecord>::create(path, header).expect("Failed to create alignments");
    for record in records {
        writer.write(record).expect("Failed to write alignment");
    }
    writer.finish(&Footer::new(processed_reads)).expect("Failed to finish alignments");
    path.to_path_buf()
}

/// Writes `n` complete alignments with read ids `0..n`, declaring `n` processed reads.
pub fn write_sequential_alignments(path: &Path, n: u64, junction_prefix: &str) -> PathBuf {
    let records: Vec<AlignmentRecord> =
        (0..n).map(|i| alignment(i, &format!("{junction_prefix}{i:04}"))).collect();
    write_alignments(path, &untagged_header(), &records, n)
}

pub fn write_clones(path: &Path, clones: Vec<CloneRecord>, processed_reads: u64) -> PathBuf {
    let mut writer =
        RecordWriter::<CloneRecord>::create(path, &untagged_header()).expect("Failed to create clones");
    for clone in CloneSet::new(clones).clones() {
        writer.write(clone).expect("Failed to write clone");
    }
    writer.finish(&Footer::new(processed_reads)).expect("Failed to finish clones");
    path.to_path_buf()
}

/// Writes a combined file. Alignments may be in any order; they are collated by clone.
pub fn write_clna(
    path: &Path,
    clones: Vec<CloneRecord>,
    alignments: Vec<AlignmentRecord>,
    processed_reads: u64,
) -> PathBuf {
    let mut writer = ClnaWriter::create(path, &untagged_header()).expect("Failed to create clna");
    writer.write_clones(&CloneSet::new(clones)).expect("Failed to write clones");
    let sorter = ExternalSorter::new().max_records(16);
    writer
        .collate_alignments(alignments.into_iter().map(Ok), &sorter)
        .expect("Failed to write alignments");
    writer.finish(&Footer::new(processed_reads)).expect("Failed to finish clna");
    path.to_path_buf()
}

pub fn write_trees(path: &Path, datasets: &[&str], trees: &[TreeRecord]) -> PathBuf {
    let header = Header {
        datasets: datasets.iter().map(ToString::to_string).collect(),
        ..untagged_header()
    };
    let mut writer = RecordWriter::<TreeRecord>::create(path, &header).expect("Failed to create trees");
    for tree in trees {
        writer.write(tree).expect("Failed to write tree");
    }
    writer.finish(&Footer::new(0)).expect("Failed to finish trees");
    path.to_path_buf()
}

pub fn read_alignments(path: &Path) -> Vec<AlignmentRecord> {
    RecordReader::<AlignmentRecord>::open(path)
        .expect("Failed to open alignments")
        .read_all()
        .expect("Failed to read alignments")
}

pub fn read_clones(path: &Path) -> Vec<CloneRecord> {
    RecordReader::<CloneRecord>::open(path)
        .expect("Failed to open clones")
        .read_all()
        .expect("Failed to read clones")
}

pub fn open_clna(path: &Path) -> ClnaReader {
    ClnaReader::open(path).expect("Failed to open clna")
}

/// Runs the clonekit binary with `args`.
pub fn run_clonekit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_clonekit"))
        .args(args)
        .output()
        .expect("Failed to run clonekit")
}

/// Converts a path to the `&str` form expected by [`run_clonekit`].
pub fn arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}
