//! Clone records and clone sets.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::genes::GeneHits;
use super::tags::TagCount;
use super::VdjObject;

/// An assembled clonotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneRecord {
    /// Dense 0-based id within the file.
    pub id: u64,
    /// Abundance (may be fractional after tag-based weighting).
    pub count: f64,
    /// `count` relative to the total of the owning clone set.
    pub fraction: f64,
    pub targets: Vec<String>,
    pub junction: Option<String>,
    pub hits: GeneHits,
    pub tag_count: TagCount,
}

impl CloneRecord {
    #[must_use]
    pub fn new(id: u64, count: f64, targets: Vec<String>, hits: GeneHits) -> Self {
        Self {
            id,
            count,
            fraction: 0.0,
            targets,
            junction: None,
            hits,
            tag_count: TagCount::new(),
        }
    }

    #[must_use]
    pub fn with_junction(mut self, junction: impl Into<String>) -> Self {
        self.junction = Some(junction.into());
        self
    }

    #[must_use]
    pub fn with_tag_count(mut self, tag_count: TagCount) -> Self {
        self.tag_count = tag_count;
        self
    }

    #[must_use]
    pub fn with_id(&self, id: u64) -> Self {
        Self { id, ..self.clone() }
    }

    #[must_use]
    pub fn with_fraction(&self, fraction: f64) -> Self {
        Self { fraction, ..self.clone() }
    }
}

impl VdjObject for CloneRecord {
    fn hits(&self) -> &GeneHits {
        &self.hits
    }

    fn junction(&self) -> Option<&str> {
        self.junction.as_deref()
    }
}

/// Abundance order: larger count first, then smaller id.
#[must_use]
pub fn abundance_order(a: &CloneRecord, b: &CloneRecord) -> Ordering {
    b.count.total_cmp(&a.count).then_with(|| a.id.cmp(&b.id))
}

/// A set of clones whose totals, fractions and ranks are always derived from its members.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneSet {
    clones: Vec<CloneRecord>,
    total_count: f64,
    /// `ranks[i]` is the 0-based abundance rank of `clones[i]`.
    ranks: Vec<usize>,
}

impl CloneSet {
    /// Builds a set, recomputing the total, every fraction and the abundance ranks.
    ///
    /// Incoming fractions are ignored; they are only meaningful relative to the set a clone
    /// belongs to.
    #[must_use]
    pub fn new(clones: Vec<CloneRecord>) -> Self {
        let total_count: f64 = clones.iter().map(|c| c.count).sum();
        let clones: Vec<CloneRecord> = clones
            .into_iter()
            .map(|c| {
                let fraction = if total_count > 0.0 { c.count / total_count } else { 0.0 };
                c.with_fraction(fraction)
            })
            .collect();

        let mut order: Vec<usize> = (0..clones.len()).collect();
        order.sort_by(|&a, &b| abundance_order(&clones[a], &clones[b]));
        let mut ranks = vec![0; clones.len()];
        for (rank, index) in order.into_iter().enumerate() {
            ranks[index] = rank;
        }

        Self { clones, total_count, ranks }
    }

    /// Builds a set with ids reassigned to positions `0..n`.
    #[must_use]
    pub fn renumbered(clones: Vec<CloneRecord>) -> Self {
        Self::new(clones.into_iter().enumerate().map(|(i, c)| c.with_id(i as u64)).collect())
    }

    #[must_use]
    pub fn clones(&self) -> &[CloneRecord] {
        &self.clones
    }

    #[must_use]
    pub fn into_clones(self) -> Vec<CloneRecord> {
        self.clones
    }

    #[must_use]
    pub fn total_count(&self) -> f64 {
        self.total_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    /// Abundance rank of the clone at `position`.
    #[must_use]
    pub fn rank(&self, position: usize) -> Option<usize> {
        self.ranks.get(position).copied()
    }
}
