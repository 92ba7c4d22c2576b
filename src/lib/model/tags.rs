//! Molecular and cell barcode tags.
//!
//! A [`TagTuple`] is the ordered list of tag values attached to a record. Its first `depth`
//! values form the key prefix used to sort and group records belonging to the same
//! sample, cell or molecule. The tag schema of a file ([`TagsInfo`]) orders tags from the
//! coarsest (sample) to the finest (molecule) so that a prefix at the cell depth groups all
//! molecules of a cell together.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ClonekitError;

/// Granularity of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagKind {
    Sample,
    Cell,
    Molecule,
}

/// One entry of the tag schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub kind: TagKind,
}

impl TagInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TagKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Tag schema of a file plus the depth up to which its records are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsInfo {
    tags: Vec<TagInfo>,
    sorting_level: usize,
}

impl TagsInfo {
    /// Creates a schema; tags must be ordered from coarse to fine.
    pub fn new(tags: Vec<TagInfo>) -> Result<Self, ClonekitError> {
        if tags.windows(2).any(|w| w[0].kind > w[1].kind) {
            return Err(ClonekitError::InvalidParameter {
                parameter: "tags".to_string(),
                reason: "tags must be ordered sample, cell, molecule".to_string(),
            });
        }
        Ok(Self { tags, sorting_level: 0 })
    }

    /// Schema of untagged data.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_no_tags(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn tags(&self) -> &[TagInfo] {
        &self.tags
    }

    /// Number of leading tags with a kind up to and including `kind`.
    #[must_use]
    pub fn depth_for(&self, kind: TagKind) -> usize {
        self.tags.iter().take_while(|t| t.kind <= kind).count()
    }

    /// Depth up to which the records of the file are sorted.
    #[must_use]
    pub fn sorting_level(&self) -> usize {
        self.sorting_level
    }

    /// Returns a copy marked as sorted up to `depth`.
    #[must_use]
    pub fn with_sorting_level(&self, depth: usize) -> Self {
        Self { tags: self.tags.clone(), sorting_level: depth.min(self.tags.len()) }
    }
}

/// Ordered tag values of one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagTuple(pub Vec<String>);

impl TagTuple {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagTuple(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First `depth` values; an error when the tuple is shorter than `depth`.
    pub fn key_prefix(&self, depth: usize) -> Result<TagTuple, ClonekitError> {
        if depth > self.0.len() {
            return Err(ClonekitError::InvalidParameter {
                parameter: "tag depth".to_string(),
                reason: format!("tuple {self} has fewer than {depth} values"),
            });
        }
        Ok(TagTuple(self.0[..depth].to_vec()))
    }
}

impl fmt::Display for TagTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join("+"))
    }
}

/// Tag tuples with their (possibly fractional) read counts, aggregated over a clone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    counts: BTreeMap<TagTuple, f64>,
}

impl TagCount {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-tuple count.
    #[must_use]
    pub fn single(tuple: TagTuple, count: f64) -> Self {
        let mut tc = Self::new();
        tc.counts.insert(tuple, count);
        tc
    }

    /// Returns a copy with `count` added for `tuple`.
    #[must_use]
    pub fn plus(&self, tuple: TagTuple, count: f64) -> Self {
        let mut tc = self.clone();
        *tc.counts.entry(tuple).or_insert(0.0) += count;
        tc
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.counts.values().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagTuple, &f64)> {
        self.counts.iter()
    }

    /// Counts collapsed onto their key prefix of the given depth.
    pub fn key_prefix_counts(&self, depth: usize) -> Result<TagCount, ClonekitError> {
        let mut out = TagCount::new();
        for (tuple, count) in &self.counts {
            *out.counts.entry(tuple.key_prefix(depth)?).or_insert(0.0) += count;
        }
        Ok(out)
    }
}
