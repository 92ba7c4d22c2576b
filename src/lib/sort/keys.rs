//! Sort orders and keys for record files.
//!
//! - [`AlignmentSortOrder::ReadId`]: smallest read id, then alignment index
//! - [`AlignmentSortOrder::Tags`]: full tag tuple, then smallest read id; files sorted this
//!   way can be grouped at any tag depth
//! - clone files are sorted by abundance ([`crate::model::clone::abundance_order`])

use std::cmp::Ordering;
use std::fmt;

use crate::model::{AlignmentRecord, TagTuple};

/// Sort orders for alignment files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentSortOrder {
    ReadId,
    Tags,
}

impl fmt::Display for AlignmentSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadId => f.write_str("read-id"),
            Self::Tags => f.write_str("tags"),
        }
    }
}

/// Read-id order key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadIdKey {
    pub min_read_id: u64,
    pub alignment_index: u64,
}

impl ReadIdKey {
    #[must_use]
    pub fn of(record: &AlignmentRecord) -> Self {
        Self { min_read_id: record.min_read_id(), alignment_index: record.alignment_index }
    }
}

/// Tag order key; ties on the tags fall back to read-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TagKey<'a> {
    pub tags: &'a TagTuple,
    pub read_id: ReadIdKey,
}

impl<'a> TagKey<'a> {
    #[must_use]
    pub fn of(record: &'a AlignmentRecord) -> Self {
        Self { tags: &record.tags, read_id: ReadIdKey::of(record) }
    }
}

impl AlignmentSortOrder {
    /// Compares two alignments in this order.
    #[must_use]
    pub fn compare(self, a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        match self {
            Self::ReadId => ReadIdKey::of(a).cmp(&ReadIdKey::of(b)),
            Self::Tags => TagKey::of(a).cmp(&TagKey::of(b)),
        }
    }
}
