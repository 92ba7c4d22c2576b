//! Custom assertion helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::process::Output;

use clonekit_lib::ClonekitError;
use clonekit_lib::model::AlignmentRecord;
use clonekit_lib::record_io::ClnaReader;

/// Asserts that the command exited successfully, printing its stderr otherwise.
///
/// # Panics
///
/// Panics if the command failed.
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "clonekit failed with {:?}:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Asserts that the command failed and its stderr mentions `expected`.
///
/// # Panics
///
/// Panics if the command succeeded or the message is missing.
pub fn assert_failure_mentions(output: &Output, expected: &str) {
    assert!(!output.status.success(), "clonekit unexpectedly succeeded");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(expected), "stderr does not mention '{expected}':\n{stderr}");
}

/// Asserts that no two alignments share a read id and indices run `0..n`.
///
/// # Panics
///
/// Panics on a duplicate read id or a gap in the alignment indices.
pub fn assert_unique_read_ids(records: &[AlignmentRecord]) {
    let mut seen = HashSet::new();
    for (position, record) in records.iter().enumerate() {
        assert_eq!(record.alignment_index, position as u64, "alignment index gap");
        for id in &record.read_ids {
            assert!(seen.insert(*id), "read id {id} appears twice");
        }
    }
}

/// Asserts that every stored alignment of a combined file references an existing clone
/// and lies in its clone's run.
///
/// # Panics
///
/// Panics if an alignment references a missing clone or sits in another clone's run.
pub fn assert_referential_integrity(reader: &ClnaReader) {
    let clones = reader.number_of_clones() as i64;
    let mut total = 0;
    for clone_index in -1..clones {
        for alignment in reader.alignments_of_clone(clone_index).expect("Failed to read run") {
            let alignment = alignment.expect("Failed to read alignment");
            assert_eq!(alignment.clone_index, clone_index);
            total += 1;
        }
    }
    assert_eq!(total, reader.number_of_alignments());
}

/// Asserts that an error chain contains a clonekit error matching `predicate`.
///
/// # Panics
///
/// Panics if no error in the chain matches.
pub fn assert_clonekit_error(err: &anyhow::Error, predicate: impl Fn(&ClonekitError) -> bool) {
    let matched = err.chain().filter_map(|e| e.downcast_ref::<ClonekitError>()).any(predicate);
    assert!(matched, "unexpected error: {err:#}");
}

/// Asserts that `path` does not exist.
///
/// # Panics
///
/// Panics if it exists.
pub fn assert_absent(path: &Path) {
    assert!(!path.exists(), "{} should not exist", path.display());
}
