//! Custom error types for clonekit operations.
//!
//! Errors fall into two classes. Validation errors describe bad user input (a missing
//! file, the wrong file type, an id that does not exist) and are reported before or during
//! the first write, so no output file is ever finalized. Consistency errors mean that an
//! invariant the code relies on was broken (grouping keys out of order, mismatched group
//! keys between two parallel cursors, a dangling clone reference); they are never
//! recovered from inside the library.

use std::fmt;

use thiserror::Error;

/// Result type alias for clonekit operations
pub type Result<T> = std::result::Result<T, ClonekitError>;

/// Error type for clonekit operations
#[derive(Error, Debug)]
pub enum ClonekitError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "alignments", "clones")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// File has no footer, i.e. the producing step never finished
    #[error("File '{path}' is unfinished (no footer); it was not written completely")]
    UnfinishedFile {
        /// Path to the file
        path: String,
    },

    /// A file of one kind was given where another kind was expected
    #[error("File '{path}' is a {actual} file, expected {expected}")]
    WrongFileType {
        /// Path to the file
        path: String,
        /// What the command expected
        expected: String,
        /// What the file actually is
        actual: String,
    },

    /// Requested id does not exist in the input
    #[error("Id {id} not found in '{path}' ({available} records available)")]
    IdNotFound {
        /// The missing id
        id: u64,
        /// Path to the file
        path: String,
        /// Number of records in the file
        available: u64,
    },

    /// Requested id list contains the same id more than once
    #[error("Id {id} appears more than once in the id list")]
    DuplicateId {
        /// The duplicated id
        id: u64,
    },

    /// Several inputs cannot be combined into one output
    #[error("Input '{path}' is incompatible with '{first}': {reason}")]
    IncompatibleInputs {
        /// The first input (reference for compatibility)
        first: String,
        /// The offending input
        path: String,
        /// Explanation of the incompatibility
        reason: String,
    },

    /// Stored bytes do not decode to a valid value
    #[error("Malformed record data: {reason}")]
    MalformedRecord {
        /// Explanation of the problem
        reason: String,
    },

    /// A record references a gene missing from the header's gene catalog
    #[error("Gene '{gene}' is not present in the gene catalog")]
    UnknownGene {
        /// Gene name
        gene: String,
    },

    /// Internal invariant violated
    #[error("Internal consistency error: {0}")]
    Consistency(#[from] ConsistencyError),
}

impl ClonekitError {
    /// Returns true for the internal-consistency class of errors.
    #[must_use]
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

/// Broken invariants, each carrying the offending keys or ids.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A grouped stream produced a key smaller than or equal to an already finished group
    #[error("group keys out of order: {current} follows {previous}")]
    GroupKeyOutOfOrder {
        /// Key of the previous group
        previous: String,
        /// Key that was seen after it
        current: String,
    },

    /// Two key-synchronized group cursors disagree
    #[error("group key mismatch between parallel streams: {left} != {right}")]
    GroupKeyMismatch {
        /// Key on the left cursor (or `<end>`)
        left: String,
        /// Key on the right cursor (or `<end>`)
        right: String,
    },

    /// A stream that must be sorted by key is not
    #[error("{stream} stream is not sorted: key {current} follows {previous}")]
    StreamNotSorted {
        /// Which stream
        stream: String,
        /// Previous key
        previous: String,
        /// Key that was seen after it
        current: String,
    },

    /// A clone/alignment link does not resolve
    #[error("alignment {alignment_index} references clone {clone_index}: {reason}")]
    CloneReferenceMismatch {
        /// Alignment index
        alignment_index: u64,
        /// Referenced clone index
        clone_index: i64,
        /// What is wrong
        reason: String,
    },
}

impl ConsistencyError {
    /// Builds an out-of-order error from any two debuggable keys.
    pub fn out_of_order<K: fmt::Debug>(previous: &K, current: &K) -> Self {
        Self::GroupKeyOutOfOrder {
            previous: format!("{previous:?}"),
            current: format!("{current:?}"),
        }
    }

    /// Builds a key mismatch error; `None` stands for an exhausted cursor.
    pub fn mismatch<K: fmt::Debug>(left: Option<&K>, right: Option<&K>) -> Self {
        let show = |k: Option<&K>| k.map_or_else(|| "<end>".to_string(), |k| format!("{k:?}"));
        Self::GroupKeyMismatch { left: show(left), right: show(right) }
    }
}
