//! CLI command implementations for clonekit.
//!
//! Each submodule implements a specific command on top of the library operations.
//!
//! # Command Categories
//!
//! ## Files
//! - [`merge`] - Merge alignment or clone files
//! - [`sort`] - Sort alignments by read id or tags, clones by abundance
//! - [`slice`] - Extract records by id
//!
//! ## Assembly
//! - [`assemble_partial`] - Overlap partial alignments of the same molecule
//!
//! ## QC
//! - [`diff`] - Compare two alignment files
//! - [`filter`] - Filter alignments by predicates
//! - [`chain_usage`] - Per-chain usage statistics
//!
//! ## Export
//! - [`export_tree_nodes`] - Tree node clones per dataset

#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args
)]

pub mod assemble_partial;
pub mod chain_usage;
pub mod command;
pub mod common;
pub mod diff;
pub mod export_tree_nodes;
pub mod filter;
pub mod merge;
pub mod slice;
pub mod sort;
