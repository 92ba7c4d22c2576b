//! Per-chain usage statistics of one or more files.

use anyhow::Result;
use clap::Parser;
use clonekit_lib::aggregate::{ChainUsageRow, chain_usage_of_files, default_workers};
use clonekit_lib::logging::log_chain_usage_summary;
use clonekit_lib::report::{write_json, write_tsv};
use clonekit_lib::validation::{validate_files_exist, validate_positive};
use itertools::Itertools;
use std::path::PathBuf;

use crate::commands::command::Command;

/// Report chain usage.
#[derive(Debug, Parser)]
#[command(
    name = "chain-usage",
    about = "\x1b[38;5;166m[QC]\x1b[0m             \x1b[36mCount records per chain, with chimeras and non-functional records\x1b[0m",
    long_about = r#"
Count the records of each input per chain.

Alignments are counted for .alns files and clones for .clns and .clna files. A record
whose V and J chains differ is a chimera. For every chain the table holds the total,
productive, non-functional (out of frame or containing a stop codon), out-of-frame and
stop-codon counts, one row per input and chain.

EXAMPLES:

  clonekit chain-usage -i a.clns b.clns -o usage.tsv
"#
)]
pub struct ChainUsage {
    /// Input files.
    #[arg(short = 'i', long = "input", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output TSV table.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Optional JSON output with the report of every input.
    #[arg(long = "json-report")]
    pub json_report: Option<PathBuf>,

    /// Number of counting threads; defaults to min(4, available cores).
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,
}

impl Command for ChainUsage {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_files_exist(&self.inputs, "Input")?;
        let threads = self.threads.unwrap_or_else(default_workers);
        validate_positive(threads, "threads")?;

        let reports = chain_usage_of_files(&self.inputs, threads)?;
        let rows = reports
            .iter()
            .flat_map(|(path, report)| ChainUsageRow::rows_of(&path.display().to_string(), report))
            .collect_vec();
        for (path, report) in &reports {
            log_chain_usage_summary(&path.display().to_string(), report);
        }
        write_tsv(&self.output, &rows, "chain usage")?;

        if let Some(path) = &self.json_report {
            let by_file =
                reports.iter().map(|(p, r)| (p.display().to_string(), r)).collect::<std::collections::BTreeMap<_, _>>();
            write_json(path, &by_file)?;
        }
        Ok(())
    }
}
