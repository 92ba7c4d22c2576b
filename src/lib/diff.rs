//! Comparison of two alignment files, record by record, or of two clone sets.
//!
//! Both inputs must be sorted by read id (the order produced by the aligner and by
//! `sort --order read-id`). The differ walks them in lock-step on the smallest read id of each
//! record: a key present on one side only is classified as only-first/only-second, a key
//! present on both sides is compared with [`DiffOptions`] and classified as same or different.
//! A stream whose keys do not strictly increase is rejected with
//! [`ConsistencyError::StreamNotSorted`].
//!
//! Clone sets are compared by clone key instead ([`diff_clone_sets`]): the clonal sequence,
//! optionally extended with the best V, J and C genes. Clones whose key appears in one set
//! only are unique to that set.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::errors::{ClonekitError, ConsistencyError};
use crate::header::{Footer, Provenance};
use crate::logging::OperationTimer;
use crate::model::{AlignmentRecord, CloneRecord, CloneSet, GeneType};
use crate::progress::ProgressTracker;
use crate::record_io::{RecordFile, RecordReader, RecordWriter};

/// Feature compared between paired records in addition to gene hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffFeature {
    #[default]
    Junction,
    None,
}

/// Likeness policy for records sharing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    pub feature: DiffFeature,
    /// Number of top hits per gene type that must agree.
    pub top_hits_level: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { feature: DiffFeature::Junction, top_hits_level: 1 }
    }
}

/// Which attributes of a pair differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mismatch {
    pub junction: bool,
    /// Indexed by [`GeneType::ordinal`].
    pub genes: [bool; 4],
}

impl Mismatch {
    #[must_use]
    pub fn is_same(&self) -> bool {
        !self.junction && !self.genes.iter().any(|g| *g)
    }
}

/// Compares two records under `options`.
#[must_use]
pub fn compare_records(a: &AlignmentRecord, b: &AlignmentRecord, options: &DiffOptions) -> Mismatch {
    let junction = match options.feature {
        DiffFeature::Junction => a.junction != b.junction,
        DiffFeature::None => false,
    };
    let mut genes = [false; 4];
    for gene_type in GeneType::ALL {
        genes[gene_type.ordinal()] =
            !a.hits.same_top_hits(&b.hits, gene_type, options.top_hits_level);
    }
    Mismatch { junction, genes }
}

/// Counts per classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub only_first: u64,
    pub only_second: u64,
    pub same: u64,
    pub different: u64,
    pub junction_mismatches: u64,
    pub v_hit_mismatches: u64,
    pub d_hit_mismatches: u64,
    pub j_hit_mismatches: u64,
    pub c_hit_mismatches: u64,
}

impl DiffReport {
    fn record_mismatch(&mut self, mismatch: &Mismatch) {
        self.different += 1;
        self.junction_mismatches += u64::from(mismatch.junction);
        self.v_hit_mismatches += u64::from(mismatch.genes[GeneType::Variable.ordinal()]);
        self.d_hit_mismatches += u64::from(mismatch.genes[GeneType::Diversity.ordinal()]);
        self.j_hit_mismatches += u64::from(mismatch.genes[GeneType::Joining.ordinal()]);
        self.c_hit_mismatches += u64::from(mismatch.genes[GeneType::Constant.ordinal()]);
    }
}

/// One classification step of the walk.
#[derive(Debug)]
pub enum DiffEvent<'a> {
    OnlyFirst(&'a AlignmentRecord),
    OnlySecond(&'a AlignmentRecord),
    Same(&'a AlignmentRecord, &'a AlignmentRecord),
    Different(&'a AlignmentRecord, &'a AlignmentRecord, Mismatch),
}

/// Head of one sorted input, checking that keys strictly increase.
struct SortedCursor<I> {
    name: &'static str,
    records: I,
    current: Option<AlignmentRecord>,
    previous_key: Option<u64>,
}

impl<I: Iterator<Item = Result<AlignmentRecord>>> SortedCursor<I> {
    fn new(name: &'static str, records: I) -> Result<Self> {
        let mut cursor = Self { name, records, current: None, previous_key: None };
        cursor.advance()?;
        Ok(cursor)
    }

    fn key(&self) -> Option<u64> {
        self.current.as_ref().map(AlignmentRecord::min_read_id)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.records.next().transpose()?;
        if let Some(key) = self.key() {
            if let Some(previous) = self.previous_key.filter(|p| key <= *p) {
                return Err(ClonekitError::from(ConsistencyError::StreamNotSorted {
                    stream: self.name.to_string(),
                    previous: previous.to_string(),
                    current: key.to_string(),
                })
                .into());
            }
            self.previous_key = Some(key);
        }
        Ok(())
    }
}

/// Walks two read-id sorted streams, passing every classification to `sink`.
pub fn diff_streams<A, B, S>(
    first: A,
    second: B,
    options: &DiffOptions,
    mut sink: S,
) -> Result<DiffReport>
where
    A: IntoIterator<Item = Result<AlignmentRecord>>,
    B: IntoIterator<Item = Result<AlignmentRecord>>,
    S: FnMut(DiffEvent<'_>) -> Result<()>,
{
    let mut left = SortedCursor::new("first", first.into_iter())?;
    let mut right = SortedCursor::new("second", second.into_iter())?;
    let mut report = DiffReport::default();

    loop {
        let order = match (left.key(), right.key()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) => l.cmp(&r),
        };
        match (order, &left.current, &right.current) {
            (Ordering::Less, Some(a), _) => {
                report.only_first += 1;
                sink(DiffEvent::OnlyFirst(a))?;
                left.advance()?;
            }
            (Ordering::Greater, _, Some(b)) => {
                report.only_second += 1;
                sink(DiffEvent::OnlySecond(b))?;
                right.advance()?;
            }
            (Ordering::Equal, Some(a), Some(b)) => {
                let mismatch = compare_records(a, b, options);
                if mismatch.is_same() {
                    report.same += 1;
                    sink(DiffEvent::Same(a, b))?;
                } else {
                    report.record_mismatch(&mismatch);
                    sink(DiffEvent::Different(a, b, mismatch))?;
                }
                left.advance()?;
                right.advance()?;
            }
            _ => break,
        }
    }
    Ok(report)
}

/// Optional alignment outputs of a diff.
#[derive(Debug, Clone, Default)]
pub struct DiffOutputs {
    pub only_first: Option<PathBuf>,
    pub only_second: Option<PathBuf>,
    pub diff_first: Option<PathBuf>,
    pub diff_second: Option<PathBuf>,
}

fn open_output(
    path: Option<&PathBuf>,
    reader: &RecordReader<AlignmentRecord>,
    provenance: &Provenance,
    options: &DiffOptions,
) -> Result<Option<RecordWriter<AlignmentRecord>>> {
    path.map(|p| {
        let header = provenance.stamp(reader.header(), "diff", Some(options))?;
        RecordWriter::create(p, &header)
    })
    .transpose()
}

fn finish_output(writer: Option<RecordWriter<AlignmentRecord>>, report: &DiffReport) -> Result<()> {
    if let Some(writer) = writer {
        let footer = Footer::new(writer.records_written()).add_report("diff", report)?;
        writer.finish(&footer)?;
    }
    Ok(())
}

/// Diffs two alignment files, writing the requested side outputs.
pub fn diff_files(
    first: &Path,
    second: &Path,
    options: &DiffOptions,
    outputs: &DiffOutputs,
    provenance: &Provenance,
) -> Result<DiffReport> {
    let timer = OperationTimer::new("Comparing alignment files");
    let first_reader = RecordReader::<AlignmentRecord>::open(first)?;
    let second_reader = RecordReader::<AlignmentRecord>::open(second)?;

    let mut only_first = open_output(outputs.only_first.as_ref(), &first_reader, provenance, options)?;
    let mut only_second =
        open_output(outputs.only_second.as_ref(), &second_reader, provenance, options)?;
    let mut diff_first = open_output(outputs.diff_first.as_ref(), &first_reader, provenance, options)?;
    let mut diff_second =
        open_output(outputs.diff_second.as_ref(), &second_reader, provenance, options)?;

    let progress = ProgressTracker::new("Compared records");
    let report = diff_streams(first_reader, second_reader, options, |event| {
        progress.log_if_needed(1);
        match event {
            DiffEvent::OnlyFirst(a) => {
                if let Some(w) = only_first.as_mut() {
                    w.write(a)?;
                }
            }
            DiffEvent::OnlySecond(b) => {
                if let Some(w) = only_second.as_mut() {
                    w.write(b)?;
                }
            }
            DiffEvent::Different(a, b, _) => {
                if let Some(w) = diff_first.as_mut() {
                    w.write(a)?;
                }
                if let Some(w) = diff_second.as_mut() {
                    w.write(b)?;
                }
            }
            DiffEvent::Same(..) => {}
        }
        Ok(())
    })?;
    progress.log_final();

    for writer in [only_first, only_second, diff_first, diff_second] {
        finish_output(writer, &report)?;
    }
    timer.log_completion(progress.count());
    Ok(report)
}

/// Genes added to the clonal sequence to form the clone key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneDiffOptions {
    pub use_v: bool,
    pub use_j: bool,
    pub use_c: bool,
}

/// Clones and reads unique to each of two clone sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloneDiffReport {
    pub clones_first: u64,
    pub clones_second: u64,
    pub shared_clones: u64,
    pub unique_clones_first: u64,
    pub unique_clones_second: u64,
    pub unique_reads_first: f64,
    pub unique_reads_second: f64,
    pub unique_read_fraction_first: f64,
    pub unique_read_fraction_second: f64,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct CloneKey<'a> {
    targets: &'a [String],
    v: Option<&'a str>,
    j: Option<&'a str>,
    c: Option<&'a str>,
}

fn best_gene(clone: &CloneRecord, gene_type: GeneType) -> Option<&str> {
    clone.hits.best(gene_type).map(|h| h.gene.as_str())
}

impl CloneDiffOptions {
    fn key<'a>(&self, clone: &'a CloneRecord) -> CloneKey<'a> {
        CloneKey {
            targets: &clone.targets,
            v: if self.use_v { best_gene(clone, GeneType::Variable) } else { None },
            j: if self.use_j { best_gene(clone, GeneType::Joining) } else { None },
            c: if self.use_c { best_gene(clone, GeneType::Constant) } else { None },
        }
    }
}

/// Explains a key collision inside one clone set, naming the option that would separate it.
fn duplicate_key_error(set: &str, kept: &CloneRecord, clone: &CloneRecord) -> ClonekitError {
    let options =
        [(GeneType::Constant, "--use-c"), (GeneType::Joining, "--use-j"), (GeneType::Variable, "--use-v")];
    let separating = options
        .into_iter()
        .find(|(gene_type, _)| best_gene(kept, *gene_type) != best_gene(clone, *gene_type));
    match separating {
        Some((gene_type, option)) => ClonekitError::InvalidParameter {
            parameter: option.to_string(),
            reason: format!(
                "clones {} and {} of the {set} clone set share a clonal sequence but differ in \
                 their {gene_type} gene; they were assembled separately by that gene, add {option}",
                kept.id, clone.id
            ),
        },
        None => ClonekitError::InvalidParameter {
            parameter: "input".to_string(),
            reason: format!(
                "clones {} and {} of the {set} clone set have the same clone key",
                kept.id, clone.id
            ),
        },
    }
}

/// Compares two clone sets by clone key.
pub fn diff_clone_sets(
    first: &CloneSet,
    second: &CloneSet,
    options: &CloneDiffOptions,
) -> Result<CloneDiffReport> {
    let mut by_key: AHashMap<CloneKey<'_>, [Option<&CloneRecord>; 2]> = AHashMap::new();
    for (side, (name, set)) in [("first", first), ("second", second)].into_iter().enumerate() {
        for clone in set.clones() {
            let slot = &mut by_key.entry(options.key(clone)).or_default()[side];
            if let Some(kept) = *slot {
                return Err(duplicate_key_error(name, kept, clone).into());
            }
            *slot = Some(clone);
        }
    }

    let mut report = CloneDiffReport {
        clones_first: first.len() as u64,
        clones_second: second.len() as u64,
        ..CloneDiffReport::default()
    };
    for pair in by_key.values() {
        match pair {
            [Some(_), Some(_)] => report.shared_clones += 1,
            [Some(a), None] => {
                report.unique_clones_first += 1;
                report.unique_reads_first += a.count;
            }
            [None, Some(b)] => {
                report.unique_clones_second += 1;
                report.unique_reads_second += b.count;
            }
            [None, None] => {}
        }
    }
    let share = |part: f64, total: f64| if total > 0.0 { part / total } else { 0.0 };
    report.unique_read_fraction_first = share(report.unique_reads_first, first.total_count());
    report.unique_read_fraction_second = share(report.unique_reads_second, second.total_count());
    Ok(report)
}

/// Reads the clone set of a clone or combined file.
pub fn read_clone_set(path: &Path) -> Result<CloneSet> {
    match RecordFile::open(path)? {
        RecordFile::Clones(reader) => Ok(CloneSet::new(reader.read_all()?)),
        RecordFile::ClonesAndAlignments(reader) => reader.read_clone_set(),
        other => Err(ClonekitError::WrongFileType {
            path: path.display().to_string(),
            expected: "clones".to_string(),
            actual: other.kind().to_string(),
        }
        .into()),
    }
}

/// Diffs the clone sets of two clone or combined files.
pub fn diff_clone_files(
    first: &Path,
    second: &Path,
    options: &CloneDiffOptions,
) -> Result<CloneDiffReport> {
    let timer = OperationTimer::new("Comparing clone sets");
    let first_set = read_clone_set(first)?;
    let second_set = read_clone_set(second)?;
    let report = diff_clone_sets(&first_set, &second_set, options)?;
    timer.log_completion(report.clones_first + report.clones_second);
    Ok(report)
}
