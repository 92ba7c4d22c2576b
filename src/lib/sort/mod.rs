//! Sorting of record files.
//!
//! [`ExternalSorter`] sorts any record stream with bounded memory; this module adds the
//! file-level operations built on it:
//!
//! - [`sort_alignment_file`]: alignments by read id or by tags. Sorting by tags marks the
//!   output header as sorted at full tag depth so it can be fed to tag grouping.
//! - [`sort_clone_file`]: clones by abundance, ids renumbered, fractions recomputed.

pub mod external;
pub mod keys;

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

pub use external::{ExternalSorter, SortStats, SortedStream};
pub use keys::{AlignmentSortOrder, ReadIdKey, TagKey};

use crate::header::Provenance;
use crate::logging::OperationTimer;
use crate::model::clone::abundance_order;
use crate::model::{AlignmentRecord, CloneRecord, CloneSet, TreeNodeRow};
use crate::record_io::{RecordReader, RecordWriter, StoredRecord};

/// Approximate in-memory footprint of a record, used to decide when to spill.
pub trait EstimatedSize {
    fn estimated_size(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

impl EstimatedSize for u64 {}
impl EstimatedSize for (u64, u64) {}
impl EstimatedSize for TreeNodeRow {}

impl EstimatedSize for AlignmentRecord {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<AlignmentRecord>()
            + self.read_ids.len() * 8
            + self.targets.iter().map(String::len).sum::<usize>()
            + self.junction.as_ref().map_or(0, String::len)
            + self.tags.0.iter().map(|t| t.len() + 24).sum::<usize>()
            + self.hits.genes().map(|g| g.len() + 32).sum::<usize>()
    }
}

impl EstimatedSize for CloneRecord {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<CloneRecord>()
            + self.targets.iter().map(String::len).sum::<usize>()
            + self.junction.as_ref().map_or(0, String::len)
            + self.tag_count.len() * 64
            + self.hits.genes().map(|g| g.len() + 32).sum::<usize>()
    }
}

#[derive(Serialize)]
struct SortReport<'a> {
    order: &'a str,
    records: u64,
    chunks_written: usize,
}

/// Sorts an alignment file.
pub fn sort_alignment_file(
    input: &Path,
    output: &Path,
    order: AlignmentSortOrder,
    sorter: &ExternalSorter,
    provenance: &Provenance,
) -> Result<SortStats> {
    let timer = OperationTimer::new(&format!("Sorting alignments by {order}"));
    let reader = RecordReader::<AlignmentRecord>::open(input)?;
    let mut header = provenance.stamp(reader.header(), "sort", Some(&order.to_string()))?;
    let depth = match order {
        AlignmentSortOrder::Tags => header.tags.len(),
        AlignmentSortOrder::ReadId => 0,
    };
    header.tags = header.tags.with_sorting_level(depth);
    let footer = reader.footer().clone();
    let codec = AlignmentRecord::codec(reader.header());

    let mut stream = sorter.sort_by(reader, codec, move |a, b| order.compare(a, b))?;
    let stats = stream.stats();
    let mut writer = RecordWriter::<AlignmentRecord>::create(output, &header)?;
    writer.write_all(&mut stream).with_context(|| format!("Failed to sort {}", input.display()))?;

    let report = SortReport {
        order: &order.to_string(),
        records: stats.total_records,
        chunks_written: stats.chunks_written,
    };
    writer.finish(&footer.add_report("sort", &report)?)?;
    info!("Sorted {} alignments using {} spill chunks", stats.total_records, stats.chunks_written);
    timer.log_completion(stats.total_records);
    Ok(stats)
}

/// Sorts a clone file by abundance and renumbers clone ids.
pub fn sort_clone_file(
    input: &Path,
    output: &Path,
    sorter: &ExternalSorter,
    provenance: &Provenance,
) -> Result<SortStats> {
    let timer = OperationTimer::new("Sorting clones by abundance");
    let reader = RecordReader::<CloneRecord>::open(input)?;
    let header = provenance.stamp(reader.header(), "sort", Some(&"abundance"))?;
    let footer = reader.footer().clone();
    let codec = CloneRecord::codec(reader.header());

    let stream = sorter.sort_by(reader, codec, abundance_order)?;
    let stats = stream.stats();
    let clones = CloneSet::renumbered(stream.collect::<Result<Vec<_>>>()?);

    let mut writer = RecordWriter::<CloneRecord>::create(output, &header)?;
    for clone in clones.clones() {
        writer.write(clone)?;
    }
    let report = SortReport {
        order: "abundance",
        records: stats.total_records,
        chunks_written: stats.chunks_written,
    };
    writer.finish(&footer.add_report("sort", &report)?)?;
    timer.log_completion(stats.total_records);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Footer, Header};
    use crate::model::{GeneHits, TagInfo, TagKind, TagTuple, TagsInfo};
    use tempfile::TempDir;

    fn tagged_header() -> Header {
        let tags = TagsInfo::new(vec![
            TagInfo::new("CELL", TagKind::Cell),
            TagInfo::new("UMI", TagKind::Molecule),
        ])
        .unwrap();
        Header { tags, ..Header::default() }
    }

    #[test]
    fn test_sort_alignment_file_by_tags() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.alns");
        let output = dir.path().join("out.alns");
        let mut writer = RecordWriter::<AlignmentRecord>::create(&input, &tagged_header()).unwrap();
        for (id, cell) in [(0u64, "C2"), (1, "C1"), (2, "C2"), (3, "C1")] {
            let record = AlignmentRecord::new(id, vec![], GeneHits::new())
                .with_tags(TagTuple::new([cell, "U1"]));
            writer.write(&record).unwrap();
        }
        writer.finish(&Footer::new(4)).unwrap();

        let sorter = ExternalSorter::new().max_records(2).temp_dir(dir.path().to_path_buf());
        let stats = sort_alignment_file(
            &input,
            &output,
            AlignmentSortOrder::Tags,
            &sorter,
            &Provenance::new("test", "clonekit sort"),
        )
        .unwrap();
        assert_eq!(stats.total_records, 4);

        let reader = RecordReader::<AlignmentRecord>::open(&output).unwrap();
        assert_eq!(reader.header().tags.sorting_level(), 2);
        assert_eq!(reader.processed_reads(), 4);
        assert_eq!(reader.footer().reports.len(), 1);
        let ids: Vec<u64> = reader.map(|r| r.unwrap().min_read_id()).collect();
        assert_eq!(ids, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_sort_clone_file_renumbers() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.clns");
        let output = dir.path().join("out.clns");
        let mut writer = RecordWriter::<CloneRecord>::create(&input, &Header::default()).unwrap();
        for (id, count) in [(0u64, 1.0), (1, 5.0), (2, 3.0)] {
            writer.write(&CloneRecord::new(id, count, vec![], GeneHits::new())).unwrap();
        }
        writer.finish(&Footer::new(9)).unwrap();

        sort_clone_file(&input, &output, &ExternalSorter::new(), &Provenance::default()).unwrap();
        let clones = RecordReader::<CloneRecord>::open(&output).unwrap().read_all().unwrap();
        let summary: Vec<(u64, f64)> = clones.iter().map(|c| (c.id, c.count)).collect();
        assert_eq!(summary, vec![(0, 5.0), (1, 3.0), (2, 1.0)]);
        assert!((clones[0].fraction - 5.0 / 9.0).abs() < 1e-12);
    }
}
