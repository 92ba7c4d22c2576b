//! Assemble partial alignments of the same molecule by overlap search.

use anyhow::{Context, Result};
use clap::Parser;
use clonekit_lib::logging::log_overlap_summary;
use clonekit_lib::overlap::{OverlapOptions, OverlapParameters, assemble_partial};
use clonekit_lib::validation::validate_file_exists;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::{IoOptions, ReportOptions, provenance};

/// Assemble partial alignments.
#[derive(Debug, Parser)]
#[command(
    name = "assemble-partial",
    about = "\x1b[38;5;72m[ASSEMBLY]\x1b[0m       \x1b[36mExtend partial alignments by exact overlap with reads of the same molecule\x1b[0m",
    long_about = r#"
Assemble alignments that cover only one side of the junction.

Left parts (V hit, no J hit, no junction) are indexed by the k-mers of their last target;
right parts (J hit, no junction) are searched k-mer by k-mer against that index and merged
with the left part sharing the longest exact overlap of at least --min-overlap bases.

For tagged input the search is done per molecule (or per cell with --cell-level); the
input must be sorted by tags (`clonekit sort --order tags`). Untagged input is searched as
one group.

PARAMETERS:

  Defaults can be replaced by a JSON file (--params) with any of the fields k_value,
  k_offset, min_overlap, max_left_parts, max_right_matches; individual flags override
  both. The effective parameters are recorded in the output header.

EXAMPLES:

  clonekit assemble-partial -i sorted.alns -o assembled.alns

  clonekit assemble-partial -i sorted.alns -o assembled.alns --cell-level --overlapped-only
"#
)]
pub struct AssemblePartial {
    #[command(flatten)]
    pub io: IoOptions,

    /// JSON file with overlap parameters.
    #[arg(long = "params")]
    pub params: Option<PathBuf>,

    /// K-mer length (1-31).
    #[arg(long = "k-value")]
    pub k_value: Option<usize>,

    /// Minimal exact overlap.
    #[arg(long = "min-overlap")]
    pub min_overlap: Option<usize>,

    /// Write only overlapped alignments.
    #[arg(long = "overlapped-only", default_value = "false")]
    pub overlapped_only: bool,

    /// Drop partial alignments that could not be overlapped.
    #[arg(long = "drop-partial", default_value = "false")]
    pub drop_partial: bool,

    /// Search overlaps within cells instead of molecules.
    #[arg(long = "cell-level", default_value = "false")]
    pub cell_level: bool,

    #[command(flatten)]
    pub report: ReportOptions,
}

impl AssemblePartial {
    fn parameters(&self) -> Result<OverlapParameters> {
        let mut parameters = match &self.params {
            Some(path) => {
                validate_file_exists(path, "Parameters")?;
                let file = File::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse overlap parameters from {}", path.display()))?
            }
            None => OverlapParameters::default(),
        };
        if let Some(k) = self.k_value {
            parameters.k_value = k;
        }
        if let Some(min_overlap) = self.min_overlap {
            parameters.min_overlap = min_overlap;
        }
        parameters.validate()?;
        Ok(parameters)
    }
}

impl Command for AssemblePartial {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        let options = OverlapOptions {
            parameters: self.parameters()?,
            overlapped_only: self.overlapped_only,
            drop_partial: self.drop_partial,
            cell_level: self.cell_level,
        };

        let report = assemble_partial(&self.io.input, &self.io.output, &options, &provenance(command_line))?;
        log_overlap_summary(&report);
        self.report.write(&report, "assemble-partial")
    }
}
