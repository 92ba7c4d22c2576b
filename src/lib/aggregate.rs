//! Concurrent per-category counting and the chain usage report built on it.
//!
//! [`ConcurrentAggregator`] keeps one set of atomic counters per category in a [`DashMap`].
//! A category is created on first use; if two workers race to create it, the first insert
//! wins and the loser drops its allocation. Counter updates never take a map-wide lock.
//!
//! [`aggregate`] drains a record stream with a small pool of scoped worker threads sharing
//! the stream behind a mutex.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::ClonekitError;
use crate::logging::OperationTimer;
use crate::model::{Chain, GeneType, VdjObject};
use crate::record_io::RecordFile;

/// Default worker count: `min(4, available parallelism)`.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get().min(4))
}

/// Counters of one category, updated through `&self`.
pub trait CategoryCounters<T: ?Sized>: Default + Send + Sync {
    type Snapshot;

    fn add(&self, record: &T);

    /// Exact inverse of [`CategoryCounters::add`].
    fn remove(&self, record: &T);

    fn snapshot(&self) -> Self::Snapshot;

    fn is_zero(&self) -> bool;
}

/// Concurrent map from category to counters.
pub struct ConcurrentAggregator<K, C> {
    categories: DashMap<K, Arc<C>>,
}

impl<K, C> Default for ConcurrentAggregator<K, C>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { categories: DashMap::new() }
    }
}

impl<K, C> ConcurrentAggregator<K, C>
where
    K: Eq + Hash + Ord + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, key: K) -> Arc<C>
    where
        C: Default,
    {
        if let Some(existing) = self.categories.get(&key) {
            return Arc::clone(existing.value());
        }
        let fresh = Arc::new(C::default());
        Arc::clone(self.categories.entry(key).or_insert(fresh).value())
    }

    pub fn increment<T: ?Sized>(&self, key: K, record: &T)
    where
        C: CategoryCounters<T>,
    {
        self.counters(key).add(record);
    }

    pub fn decrement<T: ?Sized>(&self, key: K, record: &T)
    where
        C: CategoryCounters<T>,
    {
        self.counters(key).remove(record);
    }

    /// Snapshot of every category with at least one non-zero counter.
    pub fn build_report<T: ?Sized>(&self) -> BTreeMap<K, C::Snapshot>
    where
        C: CategoryCounters<T>,
    {
        self.categories
            .iter()
            .filter(|entry| !entry.value().is_zero())
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    #[must_use]
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

/// Pulls every record of `records` on `n_workers` threads, classifying each with `classify`
/// and incrementing the counters of its category.
///
/// The first error from the stream stops all workers and is returned.
pub fn aggregate<I, T, K, C, F>(records: I, classify: F, n_workers: usize) -> Result<ConcurrentAggregator<K, C>>
where
    I: Iterator<Item = Result<T>> + Send,
    T: Send,
    K: Eq + Hash + Ord + Clone + Send + Sync,
    C: CategoryCounters<T>,
    F: Fn(&T) -> K + Sync,
{
    let aggregator = ConcurrentAggregator::new();
    let source = Mutex::new(records);
    let failure: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..n_workers.max(1) {
            scope.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    let next = source.lock().next();
                    match next {
                        Some(Ok(record)) => aggregator.increment(classify(&record), &record),
                        Some(Err(e)) => {
                            stop.store(true, Ordering::Relaxed);
                            let mut slot = failure.lock();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                        }
                        None => break,
                    }
                }
            });
        }
    });

    match failure.into_inner() {
        Some(e) => Err(e),
        None => Ok(aggregator),
    }
}

/// Chain usage category of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UsageCategory {
    Chain(Chain),
    /// V and J chains differ.
    Chimera,
    /// Neither a V nor a J hit.
    Unassigned,
}

impl UsageCategory {
    pub fn of<R: VdjObject + ?Sized>(record: &R) -> UsageCategory {
        match (record.chain_of(GeneType::Variable), record.chain_of(GeneType::Joining)) {
            (Some(v), Some(j)) if v != j => UsageCategory::Chimera,
            (Some(chain), _) | (None, Some(chain)) => UsageCategory::Chain(chain),
            (None, None) => UsageCategory::Unassigned,
        }
    }
}

/// Atomic counters of one chain.
#[derive(Debug, Default)]
pub struct ChainCounters {
    total: AtomicU64,
    non_functional: AtomicU64,
    out_of_frame: AtomicU64,
    has_stops: AtomicU64,
}

impl ChainCounters {
    fn apply<R: VdjObject + ?Sized>(&self, record: &R, update: impl Fn(&AtomicU64)) {
        update(&self.total);
        if record.is_non_functional() {
            update(&self.non_functional);
        }
        if record.is_out_of_frame() {
            update(&self.out_of_frame);
        }
        if record.has_stops() {
            update(&self.has_stops);
        }
    }
}

impl<R: VdjObject + ?Sized> CategoryCounters<R> for ChainCounters {
    type Snapshot = ChainStats;

    fn add(&self, record: &R) {
        self.apply(record, |c| {
            c.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn remove(&self, record: &R) {
        self.apply(record, |c| {
            c.fetch_sub(1, Ordering::Relaxed);
        });
    }

    fn snapshot(&self) -> ChainStats {
        ChainStats {
            total: self.total.load(Ordering::Relaxed),
            non_functional: self.non_functional.load(Ordering::Relaxed),
            out_of_frame: self.out_of_frame.load(Ordering::Relaxed),
            has_stops: self.has_stops.load(Ordering::Relaxed),
        }
    }

    fn is_zero(&self) -> bool {
        self.total.load(Ordering::Relaxed) == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    pub total: u64,
    pub non_functional: u64,
    pub out_of_frame: u64,
    pub has_stops: u64,
}

impl ChainStats {
    #[must_use]
    pub fn productive(&self) -> u64 {
        self.total - self.non_functional
    }
}

/// Chain usage of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainUsageReport {
    pub total: u64,
    pub chimeras: u64,
    pub chains: BTreeMap<Chain, ChainStats>,
}

impl ChainUsageReport {
    #[must_use]
    pub fn from_categories(categories: &BTreeMap<UsageCategory, ChainStats>) -> Self {
        let mut report = ChainUsageReport::default();
        for (category, stats) in categories {
            report.total += stats.total;
            match category {
                UsageCategory::Chain(chain) => {
                    report.chains.insert(*chain, *stats);
                }
                UsageCategory::Chimera => report.chimeras += stats.total,
                UsageCategory::Unassigned => {}
            }
        }
        report
    }
}

/// One TSV row: a chain of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainUsageRow {
    pub file: String,
    pub chain: String,
    pub total: u64,
    pub fraction: f64,
    pub productive: u64,
    pub non_functional: u64,
    pub out_of_frame: u64,
    pub has_stops: u64,
}

impl ChainUsageRow {
    /// Rows for every chain of `report`, then a `chimeras` row.
    #[must_use]
    pub fn rows_of(file: &str, report: &ChainUsageReport) -> Vec<ChainUsageRow> {
        let fraction = |n: u64| if report.total == 0 { 0.0 } else { n as f64 / report.total as f64 };
        let mut rows: Vec<ChainUsageRow> = report
            .chains
            .iter()
            .map(|(chain, stats)| ChainUsageRow {
                file: file.to_string(),
                chain: chain.to_string(),
                total: stats.total,
                fraction: fraction(stats.total),
                productive: stats.productive(),
                non_functional: stats.non_functional,
                out_of_frame: stats.out_of_frame,
                has_stops: stats.has_stops,
            })
            .collect();
        rows.push(ChainUsageRow {
            file: file.to_string(),
            chain: "chimeras".to_string(),
            total: report.chimeras,
            fraction: fraction(report.chimeras),
            productive: 0,
            non_functional: 0,
            out_of_frame: 0,
            has_stops: 0,
        });
        rows
    }
}

fn usage_of<I, R>(records: I, n_workers: usize) -> Result<ChainUsageReport>
where
    I: Iterator<Item = Result<R>> + Send,
    R: VdjObject + Send,
{
    let aggregator: ConcurrentAggregator<UsageCategory, ChainCounters> =
        aggregate(records, |r: &R| UsageCategory::of(r), n_workers)?;
    Ok(ChainUsageReport::from_categories(&aggregator.build_report::<R>()))
}

/// Chain usage of the alignments of an alignment file, or the clones of a clone or
/// combined file.
pub fn chain_usage(path: &Path, n_workers: usize) -> Result<ChainUsageReport> {
    let timer = OperationTimer::new("Computing chain usage");
    let report = match RecordFile::open(path)? {
        RecordFile::Alignments(reader) => usage_of(reader, n_workers)?,
        RecordFile::Clones(reader) => usage_of(reader, n_workers)?,
        RecordFile::ClonesAndAlignments(reader) => usage_of(reader.clones()?, n_workers)?,
        RecordFile::Trees(_) => {
            return Err(ClonekitError::InvalidParameter {
                parameter: "input".to_string(),
                reason: format!("chain usage is not defined for tree file {}", path.display()),
            }
            .into());
        }
    };
    timer.log_completion(report.total);
    Ok(report)
}

/// Chain usage of several files, keyed by path in input order.
pub fn chain_usage_of_files(paths: &[PathBuf], n_workers: usize) -> Result<Vec<(PathBuf, ChainUsageReport)>> {
    paths.iter().map(|p| Ok((p.clone(), chain_usage(p, n_workers)?))).collect()
}
