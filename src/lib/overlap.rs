//! Assembly of partial alignments by overlap search.
//!
//! Reads that cover only one side of the junction are extended by finding a read of the same
//! molecule (or cell) covering the other side with an exact sequence overlap:
//!
//! - **left parts** have a V hit, no J hit and no junction. The k-mers of their last target
//!   (from `k_offset` on) are indexed.
//! - **right parts** have a J hit and no junction. Their first target is scanned k-mer by
//!   k-mer against the index; every candidate is verified base by base and the longest exact
//!   overlap of at least `min_overlap` wins.
//!
//! The search is two-pass per group: the index is built from one pass over the group
//! ([`OverlapAssembler::build_left_index`]), then the same group is streamed a second time
//! through it ([`OverlapAssembler::search_overlaps`]). For tagged input both passes are
//! grouped by the tag prefix at molecule (or cell) depth and walked in lock-step through
//! [`PairedGroups`]; untagged input is a single group.
//!
//! Both the index size and the number of candidates checked per k-mer are bounded.
//! Reaching a bound sets a flag in the report and continues best-effort.

use std::path::Path;

use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::ClonekitError;
use crate::grouper::{KeyGrouper, PairedGroups};
use crate::header::Provenance;
use crate::logging::OperationTimer;
use crate::model::{AlignmentRecord, GeneType, TagKind, TagTuple, UNASSIGNED_CLONE, VdjObject};
use crate::progress::ProgressTracker;
use crate::record_io::{RecordReader, RecordWriter};

/// Largest k that fits two bits per base into a `u64`.
const MAX_K_VALUE: usize = 31;

/// Tunable parameters of the overlap search; loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapParameters {
    /// K-mer length.
    pub k_value: usize,
    /// First indexed position of a left part's target.
    pub k_offset: usize,
    /// Minimal exact overlap accepted.
    pub min_overlap: usize,
    /// Maximal number of left parts indexed per group.
    pub max_left_parts: usize,
    /// Maximal number of left-part candidates checked per k-mer of a right part.
    pub max_right_matches: usize,
}

impl Default for OverlapParameters {
    fn default() -> Self {
        Self { k_value: 12, k_offset: 0, min_overlap: 12, max_left_parts: 50_000, max_right_matches: 6_144 }
    }
}

impl OverlapParameters {
    pub fn validate(&self) -> Result<()> {
        let invalid = |parameter: &str, reason: String| -> Result<()> {
            Err(ClonekitError::InvalidParameter { parameter: parameter.to_string(), reason }.into())
        };
        if self.k_value == 0 || self.k_value > MAX_K_VALUE {
            return invalid("k_value", format!("must be between 1 and {MAX_K_VALUE}"));
        }
        if self.min_overlap == 0 {
            return invalid("min_overlap", "must be at least 1".to_string());
        }
        if self.max_left_parts == 0 || self.max_right_matches == 0 {
            return invalid("max_left_parts", "limits must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Parameters plus output switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapOptions {
    pub parameters: OverlapParameters,
    /// Write only overlapped records.
    pub overlapped_only: bool,
    /// Drop partial records that could not be overlapped.
    pub drop_partial: bool,
    /// Group by cell instead of molecule.
    pub cell_level: bool,
}

impl OverlapOptions {
    fn write_partial(&self) -> bool {
        !self.drop_partial && !self.overlapped_only
    }
}

/// Counters of an overlap search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapReport {
    pub total_processed: u64,
    pub total_written: u64,
    pub with_junction: u64,
    pub overlapped: u64,
    pub left_parts: u64,
    pub right_parts: u64,
    /// Left parts too short to extract a k-mer.
    pub no_kmer: u64,
    pub kmer_diversity: u64,
    pub dropped_wildcards: u64,
    pub partial_as_is: u64,
    pub left_parts_limit_reached: bool,
    pub max_right_matches_limit_reached: bool,
}

/// An exact overlap; coordinates are positions in the left target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    /// Position of the right target's first base in left coordinates.
    pub delta: isize,
    pub begin: usize,
    pub end: usize,
}

impl Overlap {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

/// Builds the record resulting from an accepted overlap.
pub trait OverlapMerger {
    fn merge(&self, left: &AlignmentRecord, right: &AlignmentRecord, overlap: &Overlap)
    -> AlignmentRecord;
}

/// Joins the two overlapping targets into one and unions reads and hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceMerger;

impl SequenceMerger {
    fn join(left: &[u8], right: &[u8], delta: isize) -> String {
        let (l_len, r_len) = (left.len() as isize, right.len() as isize);
        let start = delta.min(0);
        let end = l_len.max(delta + r_len);
        (start..end)
            .map(|p| {
                let base = if p >= delta && p < delta + r_len {
                    right.get((p - delta) as usize)
                } else {
                    usize::try_from(p).ok().and_then(|i| left.get(i))
                };
                char::from(*base.unwrap_or(&b'N'))
            })
            .collect()
    }
}

impl OverlapMerger for SequenceMerger {
    fn merge(
        &self,
        left: &AlignmentRecord,
        right: &AlignmentRecord,
        overlap: &Overlap,
    ) -> AlignmentRecord {
        let left_target = left.targets.last().map_or(&[][..], |t| t.as_bytes());
        let right_target = right.targets.first().map_or(&[][..], |t| t.as_bytes());

        let mut targets: Vec<String> =
            left.targets[..left.targets.len().saturating_sub(1)].to_vec();
        targets.push(Self::join(left_target, right_target, overlap.delta));
        targets.extend(right.targets.iter().skip(1).cloned());

        let mut read_ids: Vec<u64> = left.read_ids.iter().chain(&right.read_ids).copied().collect();
        read_ids.sort_unstable();
        read_ids.dedup();

        AlignmentRecord {
            read_ids,
            hits: left.hits.merged_with(&right.hits),
            targets,
            junction: None,
            clone_index: UNASSIGNED_CLONE,
            tags: left.tags.clone(),
            alignment_index: left.alignment_index,
        }
    }
}

/// Packs `k` bases starting at `from`; `None` if any of them is not A, C, G or T.
fn kmer(sequence: &[u8], from: usize, k: usize) -> Option<u64> {
    let mut value = 0u64;
    for base in sequence.get(from..from + k)? {
        let code = match base.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => return None,
        };
        value = (value << 2) | code;
    }
    Some(value)
}

fn is_left_part(record: &AlignmentRecord) -> bool {
    record.junction.is_none()
        && !record.targets.is_empty()
        && record.hits.best(GeneType::Variable).is_some()
        && record.hits.best(GeneType::Joining).is_none()
}

fn is_right_part(record: &AlignmentRecord) -> bool {
    record.junction.is_none()
        && !record.targets.is_empty()
        && record.hits.best(GeneType::Joining).is_some()
}

/// Index of the left parts of one group.
#[derive(Debug, Default)]
pub struct LeftIndex {
    records: Vec<AlignmentRecord>,
    /// k-mer -> (record position, k-mer start in the record's last target)
    kmers: AHashMap<u64, Vec<(usize, usize)>>,
    /// Alignment indices of partial records that were not indexed.
    not_indexed: AHashSet<u64>,
    /// Alignment indices already folded into an overlap.
    merged: AHashSet<u64>,
}

impl LeftIndex {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Two-pass overlap engine; one instance accumulates the report over all groups.
pub struct OverlapAssembler<M: OverlapMerger = SequenceMerger> {
    options: OverlapOptions,
    merger: M,
    report: OverlapReport,
}

impl OverlapAssembler<SequenceMerger> {
    pub fn new(options: OverlapOptions) -> Result<Self> {
        Self::with_merger(options, SequenceMerger)
    }
}

impl<M: OverlapMerger> OverlapAssembler<M> {
    pub fn with_merger(options: OverlapOptions, merger: M) -> Result<Self> {
        options.parameters.validate()?;
        Ok(Self { options, merger, report: OverlapReport::default() })
    }

    #[must_use]
    pub fn report(&self) -> &OverlapReport {
        &self.report
    }

    /// Index-build pass over the records of one group.
    pub fn build_left_index<I>(&mut self, records: I) -> Result<LeftIndex>
    where
        I: IntoIterator<Item = Result<AlignmentRecord>>,
    {
        let params = &self.options.parameters;
        let mut index = LeftIndex::default();
        for record in records {
            let record = record?;
            if record.junction.is_some() {
                continue;
            }
            if !is_left_part(&record) {
                index.not_indexed.insert(record.alignment_index);
                continue;
            }
            if index.records.len() >= params.max_left_parts {
                self.report.left_parts_limit_reached = true;
                index.not_indexed.insert(record.alignment_index);
                continue;
            }

            let target = record.targets.last().map_or(&[][..], |t| t.as_bytes());
            if params.k_offset + params.k_value > target.len() {
                self.report.no_kmer += 1;
                index.not_indexed.insert(record.alignment_index);
                continue;
            }
            let position = index.records.len();
            for from in params.k_offset..=target.len() - params.k_value {
                let Some(value) = kmer(target, from, params.k_value) else {
                    self.report.dropped_wildcards += 1;
                    continue;
                };
                let entries = index.kmers.entry(value).or_insert_with(|| {
                    self.report.kmer_diversity += 1;
                    Vec::new()
                });
                entries.push((position, from));
            }
            self.report.left_parts += 1;
            index.records.push(record);
        }
        Ok(index)
    }

    /// Best overlap of `right` with a not yet merged left part, if any.
    fn find_overlap(&mut self, index: &LeftIndex, right: &AlignmentRecord) -> Option<(usize, Overlap)> {
        let params = &self.options.parameters;
        let right_target = right.targets.first().map_or(&[][..], |t| t.as_bytes());
        if right_target.len() < params.k_value {
            return None;
        }
        let j_chain = right.chain_of(GeneType::Joining);
        let mut best: Option<(usize, Overlap)> = None;

        for r_from in 0..=right_target.len() - params.k_value {
            let Some(candidates) =
                kmer(right_target, r_from, params.k_value).and_then(|k| index.kmers.get(&k))
            else {
                continue;
            };
            if candidates.len() > params.max_right_matches {
                self.report.max_right_matches_limit_reached = true;
            }
            for &(position, l_from) in candidates.iter().take(params.max_right_matches) {
                let left = &index.records[position];
                if left.alignment_index == right.alignment_index
                    || index.merged.contains(&left.alignment_index)
                {
                    continue;
                }
                if let (Some(j), Some(v)) = (j_chain, left.chain_of(GeneType::Variable)) {
                    if j != v {
                        continue;
                    }
                }
                if right.hits.best(GeneType::Variable).is_some()
                    && !left.hits.same_top_hits(&right.hits, GeneType::Variable, usize::MAX)
                {
                    continue;
                }

                let left_target = left.targets.last().map_or(&[][..], |t| t.as_bytes());
                let delta = l_from as isize - r_from as isize;
                let begin = delta.max(0) as usize;
                let end = (left_target.len() as isize).min(right_target.len() as isize + delta);
                if end <= begin as isize {
                    continue;
                }
                let end = end as usize;
                let exact = (begin..end)
                    .all(|j| left_target[j] == right_target[(j as isize - delta) as usize]);
                if !exact {
                    continue;
                }
                let overlap = Overlap { delta, begin, end };
                if best.is_none_or(|(_, b)| b.len() < overlap.len()) {
                    best = Some((position, overlap));
                }
            }
        }
        best.filter(|(_, overlap)| overlap.len() >= params.min_overlap)
    }

    /// Search pass over the records of the same group, sending output records to `sink`.
    ///
    /// Left parts that were never merged are written as is at the end of the group unless
    /// partial output is disabled.
    pub fn search_overlaps<I, S>(&mut self, mut index: LeftIndex, records: I, sink: &mut S) -> Result<()>
    where
        I: IntoIterator<Item = Result<AlignmentRecord>>,
        S: FnMut(&AlignmentRecord) -> Result<()>,
    {
        let write_partial = self.options.write_partial();
        for record in records {
            let record = record?;
            self.report.total_processed += 1;

            if record.junction.is_some() {
                self.report.with_junction += 1;
                if !self.options.overlapped_only {
                    self.report.total_written += 1;
                    sink(&record)?;
                }
                continue;
            }
            if index.merged.contains(&record.alignment_index) {
                continue;
            }

            let found = if is_right_part(&record) {
                self.report.right_parts += 1;
                self.find_overlap(&index, &record)
            } else {
                None
            };
            match found {
                Some((position, overlap)) => {
                    let left = &index.records[position];
                    let merged = self.merger.merge(left, &record, &overlap);
                    index.merged.insert(left.alignment_index);
                    index.merged.insert(record.alignment_index);
                    self.report.overlapped += 1;
                    self.report.total_written += 1;
                    sink(&merged)?;
                }
                None => {
                    if write_partial && index.not_indexed.contains(&record.alignment_index) {
                        self.report.partial_as_is += 1;
                        self.report.total_written += 1;
                        sink(&record)?;
                    }
                }
            }
        }

        if write_partial {
            for left in &index.records {
                if index.merged.insert(left.alignment_index) {
                    self.report.partial_as_is += 1;
                    self.report.total_written += 1;
                    sink(left)?;
                }
            }
        }
        Ok(())
    }
}

/// Runs the overlap search over an alignment file.
pub fn assemble_partial(
    input: &Path,
    output: &Path,
    options: &OverlapOptions,
    provenance: &Provenance,
) -> Result<OverlapReport> {
    let timer = OperationTimer::new("Assembling partial alignments");
    let mut assembler = OverlapAssembler::new(options.clone())?;
    let left_reader = RecordReader::<AlignmentRecord>::open(input)?;
    let right_reader = RecordReader::<AlignmentRecord>::open(input)?;

    let tags = left_reader.header().tags.clone();
    let depth = if tags.has_no_tags() {
        0
    } else {
        tags.depth_for(if options.cell_level { TagKind::Cell } else { TagKind::Molecule })
    };
    if tags.sorting_level() < depth {
        return Err(ClonekitError::InvalidParameter {
            parameter: "input".to_string(),
            reason: format!(
                "records must be sorted by tags up to depth {depth} (sorted up to {}); run sort --order tags first",
                tags.sorting_level()
            ),
        }
        .into());
    }

    let header = provenance.stamp(
        &left_reader.header().with_tags(tags.with_sorting_level(depth)),
        "assemble-partial",
        Some(options),
    )?;
    let input_footer = left_reader.footer().clone();
    let processed_reads = left_reader.processed_reads();

    let mut writer = RecordWriter::<AlignmentRecord>::create(output, &header)?;
    let progress = ProgressTracker::new("Searched alignments");
    let mut sink = |record: &AlignmentRecord| {
        progress.log_if_needed(1);
        writer.write(record)
    };

    if depth == 0 {
        info!("Input has no grouping tags; searching overlaps over the whole file");
        let index = assembler.build_left_index(left_reader)?;
        assembler.search_overlaps(index, right_reader, &mut sink)?;
    } else {
        info!("Searching overlaps within groups of tag depth {depth}");
        let key = move |r: &AlignmentRecord| -> Result<TagTuple> { Ok(r.tags.key_prefix(depth)?) };
        let mut groups =
            PairedGroups::new(KeyGrouper::new(left_reader, key), KeyGrouper::new(right_reader, key));
        while let Some((left, right)) = groups.next_pair()? {
            let index = assembler.build_left_index(left)?;
            assembler.search_overlaps(index, right, &mut sink)?;
        }
    }
    progress.log_final();

    let report = assembler.report().clone();
    let footer = input_footer
        .with_processed_reads(processed_reads.saturating_sub(report.overlapped))
        .add_report("assemble-partial", &report)?;
    writer.finish(&footer)?;
    timer.log_completion(report.total_processed);
    Ok(report)
}
