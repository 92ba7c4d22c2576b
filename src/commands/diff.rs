//! Compare two alignment files sorted by read id, or two clone sets.

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use clonekit_lib::diff::{
    CloneDiffOptions, DiffFeature, DiffOptions, DiffOutputs, diff_clone_files, diff_files,
};
use clonekit_lib::logging::{log_clone_diff_summary, log_diff_summary};
use clonekit_lib::record_io::{FileKind, detect_kind};
use clonekit_lib::report::to_json_string;
use clonekit_lib::validation::validate_file_exists;
use serde::Serialize;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::{ReportOptions, provenance};

/// Feature compared in addition to gene hits.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GeneFeatureArg {
    /// Compare junction sequences
    Junction,
    /// Compare gene hits only
    None,
}

impl From<GeneFeatureArg> for DiffFeature {
    fn from(arg: GeneFeatureArg) -> Self {
        match arg {
            GeneFeatureArg::Junction => DiffFeature::Junction,
            GeneFeatureArg::None => DiffFeature::None,
        }
    }
}

/// Diff two alignment files or two clone sets.
#[derive(Debug, Parser)]
#[command(
    name = "diff",
    about = "\x1b[38;5;166m[QC]\x1b[0m             \x1b[36mCompare two alignment files or two clone sets\x1b[0m",
    long_about = r#"
Compare two alignment files sorted by read id (see `clonekit sort --order read-id`).

Records are paired by their smallest read id. Each record is classified as only in the
first file, only in the second file, or present in both; paired records are "same" when
the compared feature and the top gene hits of every gene type agree, and "different"
otherwise. Unsorted input is rejected.

When both inputs are clone files (.clns or .clna), clones are compared instead: each
clone is keyed by its clonal sequence, optionally extended with its best V, J and C genes
(--use-v, --use-j, --use-c). The report counts the clones and reads unique to each set.
Two clones of the same set sharing a key are an error naming the option that separates
them.

The report is printed to stdout as JSON unless --report or --json-report is given.

EXAMPLES:

  clonekit diff --first run1.alns --second run2.alns

  clonekit diff --first day0.clns --second day7.clns --use-v --use-j

  clonekit diff --first a.alns --second b.alns --only-first a_only.alns --top-hits-level 2
"#
)]
pub struct Diff {
    /// First alignment file.
    #[arg(long = "first")]
    pub first: PathBuf,

    /// Second alignment file.
    #[arg(long = "second")]
    pub second: PathBuf,

    /// Feature compared between paired records.
    #[arg(long = "gene-feature", value_enum, default_value = "junction")]
    pub feature: GeneFeatureArg,

    /// Number of top hits per gene type that must agree (0 ignores hits).
    #[arg(long = "top-hits-level", default_value = "1")]
    pub top_hits_level: usize,

    /// Output for records found only in the first file.
    #[arg(long = "only-first")]
    pub only_first: Option<PathBuf>,

    /// Output for records found only in the second file.
    #[arg(long = "only-second")]
    pub only_second: Option<PathBuf>,

    /// Output for the first-file side of differing pairs.
    #[arg(long = "diff-first")]
    pub diff_first: Option<PathBuf>,

    /// Output for the second-file side of differing pairs.
    #[arg(long = "diff-second")]
    pub diff_second: Option<PathBuf>,

    /// Include the best V gene in the clone key (clone files only).
    #[arg(long = "use-v")]
    pub use_v: bool,

    /// Include the best J gene in the clone key (clone files only).
    #[arg(long = "use-j")]
    pub use_j: bool,

    /// Include the best C gene in the clone key (clone files only).
    #[arg(long = "use-c")]
    pub use_c: bool,

    #[command(flatten)]
    pub report: ReportOptions,
}

impl Diff {
    fn diff_clones(&self) -> Result<()> {
        let alignment_outputs =
            [&self.only_first, &self.only_second, &self.diff_first, &self.diff_second];
        if alignment_outputs.iter().any(|o| o.is_some()) {
            bail!(
                "--only-first, --only-second, --diff-first and --diff-second require alignment \
                 files"
            );
        }
        let options = CloneDiffOptions { use_v: self.use_v, use_j: self.use_j, use_c: self.use_c };
        let report = diff_clone_files(&self.first, &self.second, &options)?;
        log_clone_diff_summary(&report);
        self.emit(&report)
    }

    fn diff_alignments(&self, command_line: &str) -> Result<()> {
        if self.use_v || self.use_j || self.use_c {
            bail!("--use-v, --use-j and --use-c require clone files");
        }
        let options = DiffOptions { feature: self.feature.into(), top_hits_level: self.top_hits_level };
        let outputs = DiffOutputs {
            only_first: self.only_first.clone(),
            only_second: self.only_second.clone(),
            diff_first: self.diff_first.clone(),
            diff_second: self.diff_second.clone(),
        };
        let report = diff_files(&self.first, &self.second, &options, &outputs, &provenance(command_line))?;
        log_diff_summary(&report);
        self.emit(&report)
    }

    fn emit<R: Serialize>(&self, report: &R) -> Result<()> {
        if self.report.is_enabled() {
            self.report.write(report, "diff")
        } else {
            println!("{}", to_json_string(report)?);
            Ok(())
        }
    }
}

impl Command for Diff {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.first, "First input")?;
        validate_file_exists(&self.second, "Second input")?;

        match detect_kind(&self.first)? {
            FileKind::Clones | FileKind::ClonesAndAlignments => self.diff_clones(),
            _ => self.diff_alignments(command_line),
        }
    }
}
