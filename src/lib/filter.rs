//! Predicate filtering of alignment files.
//!
//! A record is kept when it passes every configured predicate; the first failing predicate
//! is the rejection reason counted in the report. Output stops once `limit` records were
//! kept.

use std::collections::BTreeSet;
use std::path::Path;

use ahash::AHashSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::header::Provenance;
use crate::logging::{OperationTimer, format_count};
use crate::model::{AlignmentRecord, Chain, GeneType, VdjObject};
use crate::progress::ProgressTracker;
use crate::record_io::{RecordReader, RecordWriter};

/// Predicates of an alignment filter; an empty configuration keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep records whose V or J chain is one of these.
    pub chains: BTreeSet<Chain>,
    /// Keep only records with a junction.
    pub contains_junction: bool,
    /// Keep only records containing one of these read ids.
    pub read_ids: Option<BTreeSet<u64>>,
    /// Stop after this many kept records.
    pub limit: Option<u64>,
}

/// Outcome of filtering a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Pass,
    /// None of the record's chains was requested.
    WrongChain,
    NoJunction,
    /// None of the record's read ids was requested.
    ReadIdNotListed,
}

/// Compiled form of a [`FilterConfig`] for fast per-record checks.
pub struct AlignmentFilter {
    chains: AHashSet<Chain>,
    contains_junction: bool,
    read_ids: Option<AHashSet<u64>>,
}

impl AlignmentFilter {
    #[must_use]
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            chains: config.chains.iter().copied().collect(),
            contains_junction: config.contains_junction,
            read_ids: config.read_ids.as_ref().map(|ids| ids.iter().copied().collect()),
        }
    }

    #[must_use]
    pub fn check(&self, record: &AlignmentRecord) -> FilterResult {
        if !self.chains.is_empty() {
            let matches = [GeneType::Variable, GeneType::Joining]
                .into_iter()
                .filter_map(|gt| record.chain_of(gt))
                .any(|chain| self.chains.contains(&chain));
            if !matches {
                return FilterResult::WrongChain;
            }
        }
        if self.contains_junction && record.junction.is_none() {
            return FilterResult::NoJunction;
        }
        if let Some(ids) = &self.read_ids {
            if !record.read_ids.iter().any(|id| ids.contains(id)) {
                return FilterResult::ReadIdNotListed;
            }
        }
        FilterResult::Pass
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub total: u64,
    pub passed: u64,
    pub wrong_chain: u64,
    pub no_junction: u64,
    pub read_id_not_listed: u64,
    pub limit_reached: bool,
}

impl FilterReport {
    fn record(&mut self, result: FilterResult) {
        self.total += 1;
        match result {
            FilterResult::Pass => self.passed += 1,
            FilterResult::WrongChain => self.wrong_chain += 1,
            FilterResult::NoJunction => self.no_junction += 1,
            FilterResult::ReadIdNotListed => self.read_id_not_listed += 1,
        }
    }
}

/// Copies the records of `input` passing `config` to `output`.
///
/// The output footer keeps the input's processed-read count.
pub fn filter_file(
    input: &Path,
    output: &Path,
    config: &FilterConfig,
    provenance: &Provenance,
) -> Result<FilterReport> {
    let timer = OperationTimer::new("Filtering alignments");
    let reader = RecordReader::<AlignmentRecord>::open(input)?;
    let header = provenance.stamp(reader.header(), "filter", Some(config))?;
    let input_footer = reader.footer().clone();
    let mut writer = RecordWriter::<AlignmentRecord>::create(output, &header)?;

    let filter = AlignmentFilter::new(config);
    let progress = ProgressTracker::new("Filtered alignments");
    let mut report = FilterReport::default();
    for record in reader {
        if config.limit.is_some_and(|limit| report.passed >= limit) {
            report.limit_reached = true;
            break;
        }
        let record = record?;
        let result = filter.check(&record);
        report.record(result);
        if result == FilterResult::Pass {
            writer.write(&record)?;
        }
        progress.log_if_needed(1);
    }
    progress.log_final();

    writer.finish(&input_footer.add_report("filter", &report)?)?;
    log::info!(
        "Kept {} of {} alignments",
        format_count(report.passed),
        format_count(report.total)
    );
    timer.log_completion(report.total);
    Ok(report)
}
