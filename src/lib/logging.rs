//! Formatting helpers and per-command summaries for log output.

use std::time::{Duration, Instant};

use crate::aggregate::ChainUsageReport;
use crate::diff::{CloneDiffReport, DiffReport};
use crate::merge::MergeReport;
use crate::overlap::OverlapReport;
use crate::slice::SliceReport;

/// Formats an integer with thousands separators.
///
/// ```
/// use clonekit_lib::logging::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(12), "12");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with `decimals` places.
///
/// ```
/// use clonekit_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration as e.g. `45s`, `2m 15s` or `1h 30m`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let (mins, rem) = (secs / 60, secs % 60);
        if rem == 0 { format!("{mins}m") } else { format!("{mins}m {rem}s") }
    } else {
        let (hours, mins) = (secs / 3600, (secs % 3600) / 60);
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a processing rate in records per second (or per minute when slow).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }
    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        format!("{:.1} records/min", count as f64 / (secs / 60.0))
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

pub fn log_merge_summary(report: &MergeReport) {
    log::info!("Merge Summary:");
    log::info!("  Input files: {}", report.input_files);
    log::info!("  Records written: {}", format_count(report.records_written));
    log::info!("  Processed reads: {}", format_count(report.processed_reads));
}

pub fn log_slice_summary(report: &SliceReport) {
    log::info!("Slice Summary:");
    log::info!("  File kind: {}", report.kind);
    log::info!("  Requested ids: {}", format_count(report.requested_ids));
    log::info!("  Records written: {}", format_count(report.records_written));
    if report.alignments_written > 0 {
        log::info!("  Alignments written: {}", format_count(report.alignments_written));
    }
}

pub fn log_clone_diff_summary(report: &CloneDiffReport) {
    log::info!("Clone Diff Summary:");
    log::info!("  Shared clones: {}", format_count(report.shared_clones));
    log::info!(
        "  Unique clones in first: {} ({})",
        format_count(report.unique_clones_first),
        format_percent(fraction(report.unique_clones_first, report.clones_first), 2)
    );
    log::info!(
        "  Reads in unique clones in first: {:.0} ({})",
        report.unique_reads_first,
        format_percent(report.unique_read_fraction_first, 2)
    );
    log::info!(
        "  Unique clones in second: {} ({})",
        format_count(report.unique_clones_second),
        format_percent(fraction(report.unique_clones_second, report.clones_second), 2)
    );
    log::info!(
        "  Reads in unique clones in second: {:.0} ({})",
        report.unique_reads_second,
        format_percent(report.unique_read_fraction_second, 2)
    );
}

pub fn log_diff_summary(report: &DiffReport) {
    let first = report.only_first + report.same + report.different;
    let second = report.only_second + report.same + report.different;
    log::info!("Diff Summary:");
    log::info!(
        "  Only in first: {} ({})",
        format_count(report.only_first),
        format_percent(fraction(report.only_first, first), 2)
    );
    log::info!(
        "  Only in second: {} ({})",
        format_count(report.only_second),
        format_percent(fraction(report.only_second, second), 2)
    );
    log::info!("  Same: {}", format_count(report.same));
    log::info!("  Different: {}", format_count(report.different));
    if report.different > 0 {
        log::info!("    Junction mismatches: {}", format_count(report.junction_mismatches));
        log::info!("    V hit mismatches: {}", format_count(report.v_hit_mismatches));
        log::info!("    D hit mismatches: {}", format_count(report.d_hit_mismatches));
        log::info!("    J hit mismatches: {}", format_count(report.j_hit_mismatches));
        log::info!("    C hit mismatches: {}", format_count(report.c_hit_mismatches));
    }
}

pub fn log_overlap_summary(report: &OverlapReport) {
    log::info!("Partial Assembly Summary:");
    log::info!("  Total processed: {}", format_count(report.total_processed));
    log::info!("  Alignments written: {}", format_count(report.total_written));
    log::info!(
        "  Overlapped: {} ({})",
        format_count(report.overlapped),
        format_percent(fraction(report.overlapped, report.total_processed), 2)
    );
    log::info!("  Left parts: {}", format_count(report.left_parts));
    log::info!("  Right parts: {}", format_count(report.right_parts));
    log::info!("  With junction: {}", format_count(report.with_junction));
    log::info!("  Partial written as is: {}", format_count(report.partial_as_is));
    log::info!("  K-mer diversity: {}", format_count(report.kmer_diversity));
    if report.dropped_wildcards > 0 {
        log::info!("  K-mers dropped for wildcards: {}", format_count(report.dropped_wildcards));
    }
    if report.left_parts_limit_reached {
        log::warn!("  Maximal number of left parts per group was reached; results may be partial");
    }
    if report.max_right_matches_limit_reached {
        log::warn!("  Maximal number of candidates per k-mer was reached; results may be partial");
    }
}

pub fn log_chain_usage_summary(name: &str, report: &ChainUsageReport) {
    log::info!("Chain Usage ({name}):");
    log::info!("  Total: {}", format_count(report.total));
    log::info!(
        "  Chimeras: {} ({})",
        format_count(report.chimeras),
        format_percent(fraction(report.chimeras, report.total), 2)
    );
    for (chain, stats) in &report.chains {
        log::info!(
            "  {chain}: {} ({}), productive {}",
            format_count(stats.total),
            format_percent(fraction(stats.total, report.total), 2),
            format_count(stats.productive())
        );
    }
}

/// Logs the start of an operation and, on completion, its duration and rate.
///
/// ```no_run
/// use clonekit_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Sorting alignments");
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
