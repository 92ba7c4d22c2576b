//! Sort an alignment or clone file with the external sorter.
//!
//! Alignment files are sorted by read id or by tags; clone files by abundance. Records are
//! spilled to compressed temporary chunks when the memory limit is reached.

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use clonekit_lib::record_io::{FileKind, detect_kind};
use clonekit_lib::sort::{AlignmentSortOrder, sort_alignment_file, sort_clone_file};
use log::info;

use crate::commands::command::Command;
use crate::commands::common::{IoOptions, SortingOptions, provenance};

/// Sort order for alignment files.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortOrderArg {
    /// Smallest read id, then alignment index
    ReadId,
    /// Full tag tuple, then smallest read id (required by assemble-partial)
    Tags,
}

impl From<SortOrderArg> for AlignmentSortOrder {
    fn from(arg: SortOrderArg) -> Self {
        match arg {
            SortOrderArg::ReadId => AlignmentSortOrder::ReadId,
            SortOrderArg::Tags => AlignmentSortOrder::Tags,
        }
    }
}

/// Sort a record file.
#[derive(Debug, Parser)]
#[command(
    name = "sort",
    about = "\x1b[38;5;180m[FILES]\x1b[0m          \x1b[36mSort alignments by read id or tags, clones by abundance\x1b[0m",
    long_about = r#"
Sort a record file using external merge-sort.

SORT ORDERS:

  read-id   Alignments by smallest read id. Required by `clonekit diff`.

  tags      Alignments by their full tag tuple, then read id. The output header records
            the tag sorting depth so the file can be grouped by cell or molecule, as
            `clonekit assemble-partial` does.

  Clone files are always sorted by abundance (count descending, then id) and their ids
  are renumbered; --order is ignored for them.

EXAMPLES:

  clonekit sort -i raw.alns -o sorted.alns --order tags

  clonekit sort -i big.alns -o sorted.alns --order read-id --max-memory 4G --threads 4
"#
)]
pub struct Sort {
    #[command(flatten)]
    pub io: IoOptions,

    /// Sort order for alignment files.
    #[arg(long = "order", value_enum, default_value = "read-id")]
    pub order: SortOrderArg,

    #[command(flatten)]
    pub sorting: SortingOptions,
}

impl Command for Sort {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        let sorter = self.sorting.sorter_for(&self.io.output)?;
        let provenance = provenance(command_line);

        let stats = match detect_kind(&self.io.input)? {
            FileKind::Alignments => sort_alignment_file(
                &self.io.input,
                &self.io.output,
                self.order.into(),
                &sorter,
                &provenance,
            )?,
            FileKind::Clones => sort_clone_file(&self.io.input, &self.io.output, &sorter, &provenance)?,
            other => bail!("Sorting {other} files is not supported"),
        };
        info!("Wrote {} records to {}", stats.total_records, self.io.output.display());
        Ok(())
    }
}
