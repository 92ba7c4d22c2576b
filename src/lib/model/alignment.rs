//! Per-read alignment records.

use serde::{Deserialize, Serialize};

use super::genes::GeneHits;
use super::tags::TagTuple;
use super::VdjObject;

/// Clone index of an alignment that was not assigned to any clone.
pub const UNASSIGNED_CLONE: i64 = -1;

/// A read (or read pair) aligned against the gene catalog.
///
/// Records are values: every transformation returns a new record (`with_*` methods) rather
/// than mutating one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    /// Identifiers of the reads folded into this record; never empty.
    pub read_ids: Vec<u64>,
    pub hits: GeneHits,
    /// Target nucleotide sequences (one per mate).
    pub targets: Vec<String>,
    /// Junction nucleotide sequence, when it could be extracted.
    pub junction: Option<String>,
    /// Owning clone, or [`UNASSIGNED_CLONE`].
    pub clone_index: i64,
    pub tags: TagTuple,
    pub alignment_index: u64,
}

impl AlignmentRecord {
    /// Creates an unassigned, untagged record for a single read.
    #[must_use]
    pub fn new(read_id: u64, targets: Vec<String>, hits: GeneHits) -> Self {
        Self {
            read_ids: vec![read_id],
            hits,
            targets,
            junction: None,
            clone_index: UNASSIGNED_CLONE,
            tags: TagTuple::default(),
            alignment_index: read_id,
        }
    }

    #[must_use]
    pub fn with_junction(mut self, junction: impl Into<String>) -> Self {
        self.junction = Some(junction.into());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: TagTuple) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_clone_index(&self, clone_index: i64) -> Self {
        Self { clone_index, ..self.clone() }
    }

    #[must_use]
    pub fn with_alignment_index(&self, alignment_index: u64) -> Self {
        Self { alignment_index, ..self.clone() }
    }

    /// Returns a copy renumbered to `new_index` with every read id shifted by `offset`.
    #[must_use]
    pub fn shift_read_ids(&self, new_index: u64, offset: u64) -> Self {
        Self {
            read_ids: self.read_ids.iter().map(|id| id + offset).collect(),
            alignment_index: new_index,
            ..self.clone()
        }
    }

    /// Smallest read id of the record.
    #[must_use]
    pub fn min_read_id(&self) -> u64 {
        self.read_ids.iter().copied().min().unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.clone_index != UNASSIGNED_CLONE
    }

    /// Number of reads represented by this record.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.read_ids.len() as u64
    }
}

impl VdjObject for AlignmentRecord {
    fn hits(&self) -> &GeneHits {
        &self.hits
    }

    fn junction(&self) -> Option<&str> {
        self.junction.as_deref()
    }
}
