//! Merge several record files of the same kind into one.
//!
//! Inputs are concatenated in the order given. Alignment read ids of every input are
//! offset by the processed-read counts of the inputs before it, so read ids stay unique;
//! clone ids are renumbered and fractions recomputed.

use anyhow::Result;
use clap::Parser;
use clonekit_lib::logging::log_merge_summary;
use clonekit_lib::merge::merge_files;
use clonekit_lib::validation::{validate_files_exist, validate_output_not_input};
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::{ReportOptions, provenance};

/// Merge record files.
#[derive(Debug, Parser)]
#[command(
    name = "merge",
    about = "\x1b[38;5;180m[FILES]\x1b[0m          \x1b[36mMerge alignment or clone files into one file\x1b[0m",
    long_about = r#"
Merge several alignment (.alns) or clone (.clns) files into one.

All inputs must be of the same kind and share the same tag schema. Gene catalogs are
unioned. The header of the first input is kept and a `merge` step listing every input is
recorded.

ALIGNMENTS:

  Records are written input by input. Read ids of the N-th input are shifted by the sum of
  the processed-read counts of inputs 1..N-1 and alignment indices are reassigned from 0.

CLONES:

  Clone ids are renumbered 0..n in input order and fractions are recomputed over the merged
  clone set.

EXAMPLES:

  clonekit merge -i lane1.alns lane2.alns -o merged.alns
"#
)]
pub struct Merge {
    /// Input files, merged in the order given.
    #[arg(short = 'i', long = "input", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub report: ReportOptions,
}

impl Command for Merge {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_files_exist(&self.inputs, "Input")?;
        validate_output_not_input(&self.output, &self.inputs)?;

        let report = merge_files(&self.inputs, &self.output, &provenance(command_line))?;
        log_merge_summary(&report);
        self.report.write(&report, "merge")
    }
}
