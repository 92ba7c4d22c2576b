//! Extract a subset of records by id.

use anyhow::Result;
use clap::Parser;
use clonekit_lib::logging::log_slice_summary;
use clonekit_lib::slice::slice_file;

use crate::commands::command::Command;
use crate::commands::common::{IdListOptions, IoOptions, ReportOptions, SortingOptions, provenance};

/// Slice a record file by an id list.
#[derive(Debug, Parser)]
#[command(
    name = "slice",
    about = "\x1b[38;5;180m[FILES]\x1b[0m          \x1b[36mExtract records by id from any record file\x1b[0m",
    long_about = r#"
Extract the records selected by an id list into a new file of the same kind.

HOW IDS ARE MATCHED:

  .alns    Read ids. An alignment is kept if any of its read ids is listed; output is
           ordered by the list position of each alignment's first listed read id.

  .clns    Clone positions. The output holds one clone per id in list order, renumbered
  .clna    0..k. For .clna files the alignments of every selected clone follow it and are
           re-linked to the new clone id. Ids must be unique and exist.

  .trees   Tree ids. Matching trees are kept in file order with their ids.

EXAMPLES:

  clonekit slice -i clones.clna -o top.clna --id 0,1,2

  clonekit slice -i merged.alns -o picked.alns --id-file reads.txt
"#
)]
pub struct Slice {
    #[command(flatten)]
    pub io: IoOptions,

    #[command(flatten)]
    pub ids: IdListOptions,

    #[command(flatten)]
    pub sorting: SortingOptions,

    #[command(flatten)]
    pub report: ReportOptions,
}

impl Command for Slice {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        let ids = self.ids.resolve()?;
        let sorter = self.sorting.sorter_for(&self.io.output)?;

        let report = slice_file(&self.io.input, &self.io.output, &ids, &sorter, &provenance(command_line))?;
        log_slice_summary(&report);
        self.report.write(&report, "slice")
    }
}
