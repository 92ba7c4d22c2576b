#![deny(unsafe_code)]
pub mod commands;

use anyhow::Result;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());
use commands::assemble_partial::AssemblePartial;
use commands::chain_usage::ChainUsage;
use commands::command::Command;
use commands::diff::Diff;
use commands::export_tree_nodes::ExportTreeNodes;
use commands::filter::Filter;
use commands::merge::Merge;
use commands::slice::Slice;
use commands::sort::Sort;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use log::info;

#[derive(Parser, Debug)]
#[command(styles = STYLES)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
#[command(version)]
enum Subcommand {
    // Files
    #[command(display_order = 1)]
    Merge(Merge),
    #[command(display_order = 2)]
    Sort(Sort),
    #[command(display_order = 3)]
    Slice(Slice),

    // Assembly
    #[command(display_order = 4)]
    AssemblePartial(AssemblePartial),

    // QC
    #[command(display_order = 5)]
    Diff(Diff),
    #[command(display_order = 6)]
    Filter(Filter),
    #[command(display_order = 7)]
    ChainUsage(ChainUsage),

    // Export
    #[command(display_order = 8)]
    ExportTreeNodes(ExportTreeNodes),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Capture full command line BEFORE clap parsing for the header step records
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let args = Args::parse();

    info!("Running clonekit version {}", env!("CARGO_PKG_VERSION"));
    args.subcommand.execute(&command_line)
}
