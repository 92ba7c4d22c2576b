//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use clonekit_lib::header::Provenance;
use clonekit_lib::report::{report_rows, write_json, write_tsv};
use clonekit_lib::sort::ExternalSorter;
use clonekit_lib::validation::{
    parse_memory, resolve_id_list, validate_file_exists, validate_output_not_input, validate_positive,
};

/// Provenance recorded into the header of every output file.
pub fn provenance(command_line: &str) -> Provenance {
    Provenance::new(env!("CARGO_PKG_VERSION"), command_line)
}

/// Common input/output options for commands that read one record file and write one.
#[derive(Debug, Clone, Args)]
pub struct IoOptions {
    /// Input record file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output record file; the extension selects the file kind
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl IoOptions {
    /// Validates that the input file exists.
    pub fn validate(&self) -> Result<()> {
        validate_file_exists(&self.input, "Input")?;
        validate_output_not_input(&self.output, std::slice::from_ref(&self.input))?;
        Ok(())
    }
}

/// Ids given inline and/or as a newline-delimited file.
#[derive(Debug, Clone, Default, Args)]
pub struct IdListOptions {
    /// Ids to select (repeatable, or comma-separated)
    #[arg(long = "id", value_delimiter = ',')]
    pub ids: Vec<u64>,

    /// File with one id per line
    #[arg(long = "id-file")]
    pub id_file: Option<PathBuf>,
}

impl IdListOptions {
    /// Inline ids followed by the ids of the file.
    pub fn resolve(&self) -> Result<Vec<u64>> {
        resolve_id_list(&self.ids, self.id_file.as_deref())
    }
}

/// Options controlling the external sorter.
#[derive(Debug, Clone, Args)]
pub struct SortingOptions {
    /// Maximum memory to use for in-memory sorting.
    ///
    /// Accepts values like "512M", "1G", "2G". When the limit is reached, sorted chunks
    /// are written to temporary files and merged at the end.
    #[arg(short = 'm', long = "max-memory", default_value = "768M", value_parser = parse_memory)]
    pub max_memory: usize,

    /// Temporary directory for spill chunks; defaults to the output's directory.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Number of threads for sorting in-memory chunks.
    #[arg(short = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Compression level for temporary chunk files (0-9, 0 disables compression).
    #[arg(long = "temp-compression", default_value = "1", value_parser = clap::value_parser!(u32).range(0..=9))]
    pub temp_compression: u32,
}

impl Default for SortingOptions {
    fn default() -> Self {
        Self { max_memory: 768 * 1024 * 1024, tmp_dir: None, threads: 1, temp_compression: 1 }
    }
}

impl SortingOptions {
    /// Builds a sorter spilling next to `output` unless a temp dir was given.
    pub fn sorter_for(&self, output: &Path) -> Result<ExternalSorter> {
        validate_positive(self.threads, "threads")?;
        let temp_dir = match &self.tmp_dir {
            Some(dir) => dir.clone(),
            None => output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        };
        let compression = (self.temp_compression > 0).then_some(self.temp_compression);
        Ok(ExternalSorter::new()
            .memory_limit(self.max_memory)
            .temp_dir(temp_dir)
            .threads(self.threads)
            .temp_compression(compression))
    }
}

/// Options for writing a command's report next to the output footer.
#[derive(Debug, Clone, Default, Args)]
pub struct ReportOptions {
    /// Optional output file for the report as `field<TAB>value` lines
    #[arg(short = 'r', long = "report")]
    pub report: Option<PathBuf>,

    /// Optional output file for the report as JSON
    #[arg(long = "json-report")]
    pub json_report: Option<PathBuf>,
}

impl ReportOptions {
    /// Writes `report` to every requested destination.
    pub fn write<R: Serialize>(&self, report: &R, description: &str) -> Result<()> {
        if let Some(path) = &self.report {
            write_tsv(path, &report_rows(report)?, description)?;
        }
        if let Some(path) = &self.json_report {
            write_json(path, report)?;
        }
        Ok(())
    }

    /// Returns true if any report output is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.report.is_some() || self.json_report.is_some()
    }
}
