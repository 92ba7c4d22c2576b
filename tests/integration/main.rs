//! Integration tests for the clonekit library and binary.
//!
//! These tests validate end-to-end workflows that span multiple modules,
//! running the `clonekit` binary where the command-line surface matters.

mod helpers;
mod test_assemble_partial_command;
mod test_chain_usage_command;
mod test_diff_command;
mod test_error_paths;
mod test_export_tree_nodes_command;
mod test_filter_command;
mod test_merge_slice_pipeline;
mod test_slice_command;
mod test_sort_command;
