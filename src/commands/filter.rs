//! Filter alignments by chain, junction presence and read id.

use anyhow::Result;
use clap::Parser;
use clonekit_lib::filter::{FilterConfig, filter_file};
use clonekit_lib::model::Chain;
use clonekit_lib::validation::read_id_file;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::{IoOptions, ReportOptions, provenance};

/// Filter an alignment file.
#[derive(Debug, Parser)]
#[command(
    name = "filter",
    about = "\x1b[38;5;166m[QC]\x1b[0m             \x1b[36mKeep alignments matching chain, junction and read id predicates\x1b[0m",
    long_about = r#"
Keep the alignments passing every given predicate.

  --chains             V or J chain is one of the listed chains (e.g. TRA,TRB)
  --contains-junction  the alignment covers the junction
  --read-ids-file      one of the alignment's read ids is listed
  --limit              stop after this many kept alignments

The output footer keeps the input's processed-read count.

EXAMPLES:

  clonekit filter -i all.alns -o trb.alns --chains TRB --contains-junction
"#
)]
pub struct Filter {
    #[command(flatten)]
    pub io: IoOptions,

    /// Chains to keep.
    #[arg(long = "chains", value_delimiter = ',')]
    pub chains: Vec<Chain>,

    /// Keep only alignments with a junction.
    #[arg(long = "contains-junction", default_value = "false")]
    pub contains_junction: bool,

    /// File with read ids to keep, one per line.
    #[arg(long = "read-ids-file")]
    pub read_ids_file: Option<PathBuf>,

    /// Maximum number of alignments to write.
    #[arg(short = 'n', long = "limit")]
    pub limit: Option<u64>,

    #[command(flatten)]
    pub report: ReportOptions,
}

impl Command for Filter {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        let read_ids = match &self.read_ids_file {
            Some(path) => Some(read_id_file(path)?.into_iter().collect()),
            None => None,
        };
        let config = FilterConfig {
            chains: self.chains.iter().copied().collect(),
            contains_junction: self.contains_junction,
            read_ids,
            limit: self.limit,
        };

        let report = filter_file(&self.io.input, &self.io.output, &config, &provenance(command_line))?;
        self.report.write(&report, "filter")
    }
}
