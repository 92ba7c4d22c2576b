//! Concatenation of several record files into one.
//!
//! Inputs are consumed strictly one after another. Every output record gets a fresh
//! index from a running counter; alignment read ids are shifted by the number of reads the
//! previous inputs processed, so read ids stay unique over the merged file. The merged
//! footer declares the sum of the inputs' processed-read counts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::ClonekitError;
use crate::header::{Footer, Header, Provenance};
use crate::logging::OperationTimer;
use crate::model::{AlignmentRecord, CloneRecord, CloneSet};
use crate::progress::{ProgressTracker, ReportsProgress};
use crate::record_io::{FileKind, RecordReader, RecordWriter, StoredRecord, detect_kind};

/// Summary of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub input_files: usize,
    pub records_written: u64,
    pub processed_reads: u64,
}

/// Records that can be renumbered when several files are concatenated.
pub trait Renumber: StoredRecord {
    /// Copy with index `new_index` and read ids shifted by `read_offset`.
    fn renumber(&self, new_index: u64, read_offset: u64) -> Self;
}

impl Renumber for AlignmentRecord {
    fn renumber(&self, new_index: u64, read_offset: u64) -> Self {
        self.shift_read_ids(new_index, read_offset)
    }
}

impl Renumber for CloneRecord {
    fn renumber(&self, new_index: u64, _read_offset: u64) -> Self {
        self.with_id(new_index)
    }
}

#[derive(Debug, Clone)]
struct MergeInput {
    path: PathBuf,
    processed_reads: u64,
}

/// Stream over the renumbered records of several files of the same kind.
pub struct FileMerger<T: Renumber> {
    inputs: Vec<MergeInput>,
    header: Header,
    next_input: usize,
    current: Option<RecordReader<T>>,
    read_offset: u64,
    records: u64,
}

impl<T: Renumber> FileMerger<T> {
    /// Validates every input and builds the merged header.
    ///
    /// The merged header is the first input's header with the gene catalogs of all inputs
    /// unioned. Inputs must share the tag schema. Concatenated files are not sorted, so the
    /// tag sorting level is reset.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let Some(first_path) = paths.first() else {
            return Err(ClonekitError::InvalidParameter {
                parameter: "input".to_string(),
                reason: "at least one input file is required".to_string(),
            }
            .into());
        };

        let mut header: Option<Header> = None;
        let mut inputs = Vec::with_capacity(paths.len());
        for path in paths {
            let reader = RecordReader::<T>::open(path)?;
            match &mut header {
                None => header = Some(reader.header().clone()),
                Some(merged) => {
                    if merged.tags.tags() != reader.header().tags.tags() {
                        return Err(ClonekitError::IncompatibleInputs {
                            first: first_path.display().to_string(),
                            path: path.display().to_string(),
                            reason: "tag schemas differ".to_string(),
                        }
                        .into());
                    }
                    merged.genes = merged.genes.union(&reader.header().genes);
                }
            }
            inputs.push(MergeInput { path: path.clone(), processed_reads: reader.processed_reads() });
        }

        let mut header = header.unwrap_or_default();
        header.tags = header.tags.with_sorting_level(0);
        Ok(Self { inputs, header, next_input: 0, current: None, read_offset: 0, records: 0 })
    }

    /// Header shared by the merged output (without the merge step).
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Sum of the processed-read counts of all inputs.
    #[must_use]
    pub fn total_processed_reads(&self) -> u64 {
        self.inputs.iter().map(|i| i.processed_reads).sum()
    }

    #[must_use]
    pub fn records_emitted(&self) -> u64 {
        self.records
    }
}

impl<T: Renumber> Iterator for FileMerger<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        loop {
            if let Some(reader) = &mut self.current {
                match reader.next() {
                    Some(Ok(record)) => {
                        let merged = record.renumber(self.records, self.read_offset);
                        self.records += 1;
                        return Some(Ok(merged));
                    }
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        self.read_offset += self.inputs[self.next_input - 1].processed_reads;
                        self.current = None;
                    }
                }
            }
            let input = self.inputs.get(self.next_input)?;
            match RecordReader::<T>::open(&input.path) {
                Ok(reader) => {
                    info!("Merging {}", input.path.display());
                    self.current = Some(reader);
                    self.next_input += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<T: Renumber> ReportsProgress for FileMerger<T> {
    #[allow(clippy::cast_precision_loss)]
    fn progress(&self) -> f64 {
        if self.inputs.is_empty() {
            return 1.0;
        }
        let (done, within) = match &self.current {
            Some(reader) => (self.next_input - 1, reader.progress()),
            None => (self.next_input, 0.0),
        };
        (done as f64 + within) / self.inputs.len() as f64
    }
}

#[derive(Serialize)]
struct MergeParams<'a> {
    inputs: Vec<String>,
    kind: &'a str,
}

fn merge_params(paths: &[PathBuf], kind: FileKind) -> MergeParams<'static> {
    MergeParams {
        inputs: paths.iter().map(|p| p.display().to_string()).collect(),
        kind: match kind {
            FileKind::Alignments => "alignments",
            FileKind::Clones => "clones",
            FileKind::ClonesAndAlignments => "clones+alignments",
            FileKind::Trees => "trees",
        },
    }
}

/// Merges alignment or clone files into `output`.
pub fn merge_files(inputs: &[PathBuf], output: &Path, provenance: &Provenance) -> Result<MergeReport> {
    let first = inputs.first().ok_or_else(|| ClonekitError::InvalidParameter {
        parameter: "input".to_string(),
        reason: "at least one input file is required".to_string(),
    })?;
    match detect_kind(first)? {
        FileKind::Alignments => merge_alignments(inputs, output, provenance),
        FileKind::Clones => merge_clones(inputs, output, provenance),
        kind => Err(ClonekitError::InvalidParameter {
            parameter: "input".to_string(),
            reason: format!("merging {kind} files is not supported"),
        }
        .into()),
    }
}

/// Merges alignment files, streaming records straight to the output.
pub fn merge_alignments(
    inputs: &[PathBuf],
    output: &Path,
    provenance: &Provenance,
) -> Result<MergeReport> {
    let timer = OperationTimer::new("Merging alignment files");
    let mut merger = FileMerger::<AlignmentRecord>::open(inputs)?;
    let params = merge_params(inputs, FileKind::Alignments);
    let header = provenance.stamp(merger.header(), "merge", Some(&params))?;
    let processed_reads = merger.total_processed_reads();

    let mut writer = RecordWriter::<AlignmentRecord>::create(output, &header)?;
    let progress = ProgressTracker::new("Merged alignments");
    while let Some(record) = merger.next() {
        writer.write(&record?)?;
        progress.log_with_progress(1, &merger);
    }
    progress.log_final();

    let report = MergeReport {
        input_files: merger.input_count(),
        records_written: writer.records_written(),
        processed_reads,
    };
    let footer = Footer::new(processed_reads).add_report("merge", &report)?;
    writer.finish(&footer).with_context(|| format!("Failed to finish {}", output.display()))?;
    timer.log_completion(report.records_written);
    Ok(report)
}

/// Merges clone files; ids are renumbered contiguously and fractions recomputed over the
/// merged set.
pub fn merge_clones(inputs: &[PathBuf], output: &Path, provenance: &Provenance) -> Result<MergeReport> {
    let timer = OperationTimer::new("Merging clone files");
    let merger = FileMerger::<CloneRecord>::open(inputs)?;
    let params = merge_params(inputs, FileKind::Clones);
    let header = provenance.stamp(merger.header(), "merge", Some(&params))?;
    let processed_reads = merger.total_processed_reads();
    let input_files = merger.input_count();

    let clones = CloneSet::new(merger.collect::<Result<Vec<_>>>()?);
    let mut writer = RecordWriter::<CloneRecord>::create(output, &header)?;
    for clone in clones.clones() {
        writer.write(clone)?;
    }

    let report =
        MergeReport { input_files, records_written: writer.records_written(), processed_reads };
    let footer = Footer::new(processed_reads).add_report("merge", &report)?;
    writer.finish(&footer).with_context(|| format!("Failed to finish {}", output.display()))?;
    timer.log_completion(report.records_written);
    Ok(report)
}
