//! File header and footer metadata.
//!
//! The header carries the tag schema, the gene catalog that hit indices refer to, the list of
//! datasets (for tree files) and a chain of processing steps. Each step gets a unique id
//! (`merge`, `merge.1`, ...) and points at the step that ran before it, so the provenance of
//! any file can be walked back to its first producer.
//!
//! Both types are values: adding a step or a report returns a new header/footer.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{GeneCatalog, TagsInfo};

/// One processing step recorded in a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    /// Id of the step that produced the input of this one.
    pub previous: Option<String>,
    pub command: String,
    pub version: String,
    pub command_line: String,
    /// Step parameters as JSON, if the step has any.
    pub params_json: Option<String>,
}

/// Global metadata at the start of every file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub tags: TagsInfo,
    pub genes: GeneCatalog,
    pub steps: Vec<StepRecord>,
    /// Dataset names, referenced by index from tree records.
    pub datasets: Vec<String>,
}

impl Header {
    #[must_use]
    pub fn new(tags: TagsInfo, genes: GeneCatalog) -> Self {
        Self { tags, genes, steps: Vec::new(), datasets: Vec::new() }
    }

    /// Id of the last step in the chain, i.e. the one no other step points at.
    #[must_use]
    pub fn last_step_id(&self) -> Option<&str> {
        let referenced: HashSet<&str> =
            self.steps.iter().filter_map(|s| s.previous.as_deref()).collect();
        self.steps
            .iter()
            .rev()
            .find(|s| !referenced.contains(s.id.as_str()))
            .map(|s| s.id.as_str())
    }

    /// Unique step id derived from `base` by appending `.1`, `.2`, ... when taken.
    #[must_use]
    pub fn make_unique_step_id(&self, base: &str) -> String {
        let taken: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        if !taken.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}.{i}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Returns a copy with a new step chained after the current last step.
    pub fn add_step<P: Serialize>(
        &self,
        command: &str,
        version: &str,
        command_line: &str,
        params: Option<&P>,
    ) -> Result<Header> {
        let params_json = params
            .map(serde_json::to_string)
            .transpose()
            .with_context(|| format!("Failed to serialize parameters of step '{command}'"))?;
        let step = StepRecord {
            id: self.make_unique_step_id(command),
            previous: self.last_step_id().map(str::to_string),
            command: command.to_string(),
            version: version.to_string(),
            command_line: command_line.to_string(),
            params_json,
        };
        let mut header = self.clone();
        header.steps.push(step);
        Ok(header)
    }

    #[must_use]
    pub fn with_tags(&self, tags: TagsInfo) -> Header {
        Header { tags, ..self.clone() }
    }

    #[must_use]
    pub fn with_genes(&self, genes: GeneCatalog) -> Header {
        Header { genes, ..self.clone() }
    }
}

/// Version and command line of the running program, recorded into output headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub version: String,
    pub command_line: String,
}

impl Provenance {
    #[must_use]
    pub fn new(version: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self { version: version.into(), command_line: command_line.into() }
    }

    /// Chains a step for `command` onto `header`.
    pub fn stamp<P: Serialize>(
        &self,
        header: &Header,
        command: &str,
        params: Option<&P>,
    ) -> Result<Header> {
        header.add_step(command, &self.version, &self.command_line, params)
    }
}

/// A step report stored as JSON in the footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub command: String,
    pub json: String,
}

/// Trailing metadata, written exactly once when a file is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    /// Number of reads processed by the pipeline up to and including this file.
    pub processed_reads: u64,
    pub reports: Vec<StepReport>,
}

impl Footer {
    #[must_use]
    pub fn new(processed_reads: u64) -> Self {
        Self { processed_reads, reports: Vec::new() }
    }

    #[must_use]
    pub fn with_processed_reads(&self, processed_reads: u64) -> Footer {
        Footer { processed_reads, ..self.clone() }
    }

    /// Returns a copy with `report` appended.
    pub fn add_report<R: Serialize>(&self, command: &str, report: &R) -> Result<Footer> {
        let json = serde_json::to_string(report)
            .with_context(|| format!("Failed to serialize report of step '{command}'"))?;
        let mut footer = self.clone();
        footer.reports.push(StepReport { command: command.to_string(), json });
        Ok(footer)
    }
}
