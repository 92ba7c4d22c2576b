//! Progress reporting.
//!
//! Two pieces: [`ReportsProgress`] is implemented by anything that knows how far through its
//! input it is (file readers, the multi-file merger, the overlap orchestrator), and
//! [`ProgressTracker`] logs record counts at regular intervals, optionally together with the
//! fraction reported by a [`ReportsProgress`] source.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::{format_count, format_percent};

/// A stream that can tell how much of its input has been consumed.
pub trait ReportsProgress {
    /// Fraction of the input consumed, in `[0, 1]`.
    fn progress(&self) -> f64;

    /// True once all input has been consumed.
    fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// Thread-safe counter that logs every `interval` records.
///
/// ```
/// use clonekit_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Merged alignments").with_interval(100);
/// for _ in 0..250 {
///     tracker.log_if_needed(1); // logs at 100 and 200
/// }
/// tracker.log_final(); // logs "Merged alignments 250 (complete)"
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with the default interval of 100,000 records.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 100_000, message: message.into(), count: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` to the count and logs once per interval boundary crossed.
    ///
    /// Returns true when the new count is exactly on a boundary.
    pub fn log_if_needed(&self, additional: u64) -> bool {
        self.advance(additional, None)
    }

    /// Like [`Self::log_if_needed`], appending the source's progress to each log line.
    pub fn log_with_progress(&self, additional: u64, source: &dyn ReportsProgress) -> bool {
        self.advance(additional, Some(source))
    }

    fn advance(&self, additional: u64, source: Option<&dyn ReportsProgress>) -> bool {
        if additional == 0 {
            let count = self.count.load(Ordering::Relaxed);
            return count > 0 && count.is_multiple_of(self.interval);
        }

        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;

        for i in (prev / self.interval + 1)..=(new_count / self.interval) {
            let milestone = format_count(i * self.interval);
            match source {
                Some(s) => {
                    info!("{} {} ({})", self.message, milestone, format_percent(s.progress(), 1));
                }
                None => info!("{} {}", self.message, milestone),
            }
        }

        new_count.is_multiple_of(self.interval)
    }

    /// Logs the final count unless the last call already logged it.
    pub fn log_final(&self) {
        if !self.log_if_needed(0) {
            let count = self.count.load(Ordering::Relaxed);
            if count > 0 {
                info!("{} {} (complete)", self.message, format_count(count));
            }
        }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
