//! Export the clones attached to tree nodes, one table per dataset.

use anyhow::{Result, bail};
use clap::Parser;
use clonekit_lib::grouper::group_tree_nodes_by_dataset;
use clonekit_lib::logging::format_count;
use clonekit_lib::model::TreeRecord;
use clonekit_lib::record_io::RecordReader;
use clonekit_lib::report::write_tsv;
use clonekit_lib::validation::validate_file_exists;
use log::info;
use std::path::PathBuf;

use crate::commands::command::Command;
use crate::commands::common::SortingOptions;

/// Export tree nodes per dataset.
#[derive(Debug, Parser)]
#[command(
    name = "export-tree-nodes",
    about = "\x1b[38;5;30m[EXPORT]\x1b[0m         \x1b[36mWrite tree node clones to one TSV per dataset\x1b[0m",
    long_about = r#"
Flatten every tree of a .trees file into (dataset, tree, node, clone) rows and write one
TSV per dataset, named <prefix>.<dataset>.tsv. Rows are sorted by tree, node and clone.

EXAMPLES:

  clonekit export-tree-nodes -i lineages.trees -p out/nodes
"#
)]
pub struct ExportTreeNodes {
    /// Input tree file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output path prefix.
    #[arg(short = 'p', long = "prefix")]
    pub prefix: PathBuf,

    #[command(flatten)]
    pub sorting: SortingOptions,
}

impl Command for ExportTreeNodes {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input")?;
        let reader = RecordReader::<TreeRecord>::open(&self.input)?;
        let datasets = reader.header().datasets.clone();
        let sorter = self.sorting.sorter_for(&self.prefix)?;

        for (dataset, rows) in group_tree_nodes_by_dataset(reader, &sorter)? {
            let Some(name) = datasets.get(dataset as usize) else {
                bail!("Tree rows reference dataset {dataset} but the header lists {}", datasets.len());
            };
            let mut path = self.prefix.clone().into_os_string();
            path.push(format!(".{name}.tsv"));
            let path = PathBuf::from(path);
            write_tsv(&path, &rows, "tree node")?;
            info!("Wrote {} rows for dataset {name} to {}", format_count(rows.len() as u64), path.display());
        }
        Ok(())
    }
}
