//! Slicing a record file down to a list of ids.
//!
//! The meaning of an id depends on the file kind:
//!
//! - alignments: read ids. A record survives if any of its read ids is requested. Output is
//!   ordered by the position (in the id list) of each record's first requested read id and
//!   alignment indices are reassigned. Reading stops as soon as every id was found.
//! - clones: clone ids, positional. Output clone `i` is input clone `ids[i]`; totals,
//!   fractions and ranks are recomputed over the surviving set.
//! - clones+alignments: as for clones, plus every alignment of a surviving clone is
//!   re-linked to the clone's new index and given a fresh contiguous alignment index.
//!   Unassigned alignments are dropped.
//! - trees: tree ids, membership, file order, ids kept.
//!
//! Positional id lists must not contain duplicates and every id must exist; both are
//! checked before the output file is created.

use std::path::Path;

use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::codec::AlignmentCodec;
use crate::errors::{ClonekitError, ConsistencyError};
use crate::header::Provenance;
use crate::logging::OperationTimer;
use crate::model::{AlignmentRecord, CloneRecord, CloneSet, TreeRecord};
use crate::record_io::{ClnaReader, ClnaWriter, FileKind, RecordFile, RecordReader, RecordWriter};
use crate::sort::ExternalSorter;

/// Summary of a slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceReport {
    pub kind: String,
    pub requested_ids: u64,
    pub records_written: u64,
    /// Alignments written alongside clones (combined files only).
    pub alignments_written: u64,
}

#[derive(Serialize)]
struct SliceParams<'a> {
    ids: &'a [u64],
}

/// Slices any record file; the output must have the input's extension.
pub fn slice_file(
    input: &Path,
    output: &Path,
    ids: &[u64],
    sorter: &ExternalSorter,
    provenance: &Provenance,
) -> Result<SliceReport> {
    let timer = OperationTimer::new(&format!("Slicing {}", input.display()));
    let report = match RecordFile::open(input)? {
        RecordFile::Alignments(reader) => slice_alignments(reader, output, ids, sorter, provenance)?,
        RecordFile::Clones(reader) => slice_clones(reader, output, ids, provenance)?,
        RecordFile::ClonesAndAlignments(reader) => slice_clna(&reader, output, ids, provenance)?,
        RecordFile::Trees(reader) => slice_trees(reader, output, ids, provenance)?,
    };
    timer.log_completion(report.records_written);
    Ok(report)
}

/// Checks a positional id list against the number of available records.
pub fn validate_positional_ids(ids: &[u64], available: u64, path: &Path) -> Result<()> {
    let mut seen = AHashSet::with_capacity(ids.len());
    for &id in ids {
        if !seen.insert(id) {
            return Err(ClonekitError::DuplicateId { id }.into());
        }
        if id >= available {
            return Err(ClonekitError::IdNotFound {
                id,
                path: path.display().to_string(),
                available,
            }
            .into());
        }
    }
    Ok(())
}

/// Picks `ids` out of `clones` (indexed by clone id) and renumbers them by position.
fn select_clones(clones: Vec<CloneRecord>, ids: &[u64], path: &Path) -> Result<CloneSet> {
    validate_positional_ids(ids, clones.len() as u64, path)?;
    let mut by_id: AHashMap<u64, CloneRecord> = clones.into_iter().map(|c| (c.id, c)).collect();
    let mut selected = Vec::with_capacity(ids.len());
    for (new_id, old_id) in ids.iter().enumerate() {
        let clone = by_id.remove(old_id).ok_or_else(|| ClonekitError::IdNotFound {
            id: *old_id,
            path: path.display().to_string(),
            available: 0,
        })?;
        selected.push(clone.with_id(new_id as u64));
    }
    Ok(CloneSet::new(selected))
}

/// Slices an alignment file by read-id membership.
pub fn slice_alignments(
    reader: RecordReader<AlignmentRecord>,
    output: &Path,
    ids: &[u64],
    sorter: &ExternalSorter,
    provenance: &Provenance,
) -> Result<SliceReport> {
    let mut positions: AHashMap<u64, usize> = AHashMap::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        positions.entry(*id).or_insert(position);
    }
    let header = provenance.stamp(reader.header(), "slice", Some(&SliceParams { ids }))?;
    let footer = reader.footer().clone();
    let codec = AlignmentCodec::new(reader.header().genes.shared());

    let wanted = positions.len();
    let mut found = AHashSet::with_capacity(wanted);
    let mut records = reader;
    let matched = std::iter::from_fn(|| {
        while found.len() < wanted {
            let record = match records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            let mut hit = false;
            for id in &record.read_ids {
                if positions.contains_key(id) {
                    found.insert(*id);
                    hit = true;
                }
            }
            if hit {
                return Some(Ok(record));
            }
        }
        None
    });
    let first_position = |record: &AlignmentRecord| {
        record.read_ids.iter().filter_map(|id| positions.get(id).copied()).min().unwrap_or(usize::MAX)
    };
    let sorted = sorter.sort_by_key(matched, codec, first_position)?;

    let mut writer = RecordWriter::<AlignmentRecord>::create(output, &header)?;
    for (index, record) in sorted.enumerate() {
        writer.write(&record?.with_alignment_index(index as u64))?;
    }
    if found.len() < wanted {
        warn!("{} of {} requested read ids were not found", wanted - found.len(), wanted);
    }
    let report = SliceReport {
        kind: FileKind::Alignments.to_string(),
        requested_ids: ids.len() as u64,
        records_written: writer.records_written(),
        alignments_written: 0,
    };
    writer.finish(&footer.add_report("slice", &report)?)?;
    info!("Sliced {} alignments for {} read ids", report.records_written, wanted);
    Ok(report)
}

/// Slices a clone file positionally.
pub fn slice_clones(
    reader: RecordReader<CloneRecord>,
    output: &Path,
    ids: &[u64],
    provenance: &Provenance,
) -> Result<SliceReport> {
    let path = reader.path().to_path_buf();
    let header = provenance.stamp(reader.header(), "slice", Some(&SliceParams { ids }))?;
    let footer = reader.footer().clone();
    let clones = select_clones(reader.read_all()?, ids, &path)?;

    let mut writer = RecordWriter::<CloneRecord>::create(output, &header)?;
    for clone in clones.clones() {
        writer.write(clone)?;
    }
    let report = SliceReport {
        kind: FileKind::Clones.to_string(),
        requested_ids: ids.len() as u64,
        records_written: writer.records_written(),
        alignments_written: 0,
    };
    writer.finish(&footer.add_report("slice", &report)?)?;
    Ok(report)
}

/// Slices a combined file, re-linking alignments to the new clone ids.
pub fn slice_clna(
    reader: &ClnaReader,
    output: &Path,
    ids: &[u64],
    provenance: &Provenance,
) -> Result<SliceReport> {
    let header = provenance.stamp(reader.header(), "slice", Some(&SliceParams { ids }))?;
    let clones = reader.clones()?.collect::<Result<Vec<_>>>()?;
    let clones = select_clones(clones, ids, reader.path())?;

    let mut writer = ClnaWriter::create(output, &header)?;
    writer.write_clones(&clones)?;
    let alignments_written = writer.write_grouped_alignments(RelinkedAlignments::new(reader, ids))?;

    let report = SliceReport {
        kind: FileKind::ClonesAndAlignments.to_string(),
        requested_ids: ids.len() as u64,
        records_written: clones.len() as u64,
        alignments_written,
    };
    writer.finish(&reader.footer().add_report("slice", &report)?)?;
    Ok(report)
}

/// Alignments of the selected clones, clone by clone in new-id order, re-linked to the new
/// clone ids and renumbered contiguously.
struct RelinkedAlignments<'a> {
    reader: &'a ClnaReader,
    ids: &'a [u64],
    next_clone: usize,
    current: Option<(i64, Box<dyn Iterator<Item = Result<AlignmentRecord>> + 'a>)>,
    next_alignment: u64,
    failed: bool,
}

impl<'a> RelinkedAlignments<'a> {
    fn new(reader: &'a ClnaReader, ids: &'a [u64]) -> Self {
        Self { reader, ids, next_clone: 0, current: None, next_alignment: 0, failed: false }
    }

    fn open_next(&mut self) -> Option<Result<()>> {
        let old_id = *self.ids.get(self.next_clone)?;
        self.next_clone += 1;
        let opened = i64::try_from(old_id)
            .map_err(|_| {
                anyhow::Error::from(ClonekitError::IdNotFound {
                    id: old_id,
                    path: self.reader.path().display().to_string(),
                    available: self.reader.number_of_clones(),
                })
            })
            .and_then(|old_index| Ok((old_index, self.reader.alignments_of_clone(old_index)?)));
        Some(opened.map(|(old_index, alignments)| {
            self.current = Some((old_index, Box::new(alignments)));
        }))
    }
}

impl Iterator for RelinkedAlignments<'_> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Result<AlignmentRecord>> {
        if self.failed {
            return None;
        }
        loop {
            if let Some((old_index, alignments)) = &mut self.current {
                match alignments.next() {
                    Some(Ok(alignment)) => {
                        if alignment.clone_index != *old_index {
                            self.failed = true;
                            return Some(Err(ClonekitError::from(
                                ConsistencyError::CloneReferenceMismatch {
                                    alignment_index: alignment.alignment_index,
                                    clone_index: alignment.clone_index,
                                    reason: format!("stored in the run of clone {old_index}"),
                                },
                            )
                            .into()));
                        }
                        let new_index = (self.next_clone - 1) as i64;
                        let relinked = alignment
                            .with_clone_index(new_index)
                            .with_alignment_index(self.next_alignment);
                        self.next_alignment += 1;
                        return Some(Ok(relinked));
                    }
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }
            if let Err(e) = self.open_next()? {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}

/// Slices a tree file by tree-id membership.
pub fn slice_trees(
    reader: RecordReader<TreeRecord>,
    output: &Path,
    ids: &[u64],
    provenance: &Provenance,
) -> Result<SliceReport> {
    let wanted: AHashSet<u64> = ids.iter().copied().collect();
    let header = provenance.stamp(reader.header(), "slice", Some(&SliceParams { ids }))?;
    let footer = reader.footer().clone();
    let mut writer = RecordWriter::<TreeRecord>::create(output, &header)?;
    for tree in reader {
        let tree = tree?;
        if wanted.contains(&tree.tree_id) {
            writer.write(&tree)?;
        }
    }
    let report = SliceReport {
        kind: FileKind::Trees.to_string(),
        requested_ids: ids.len() as u64,
        records_written: writer.records_written(),
        alignments_written: 0,
    };
    writer.finish(&footer.add_report("slice", &report)?)?;
    Ok(report)
}
