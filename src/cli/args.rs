//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, config::ConfigCommands, inventory::InventoryCommands,
    offsets::OffsetsArgs, parse::ParseArgs, register::RegisterArgs, run::RunArgs,
    validate::ValidateArgs,
};

#[derive(Parser)]
#[command(name = "rwogp")]
#[command(author, version, about = "CMM survey ingestion and alignment")]
#[command(long_about = "Parses CMM survey reports, computes tray alignment offsets for \
assembled parts and uploads each survey once to the inspection record.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct GlobalOpts {
    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Config file layered over the global and local ones
    #[arg(long, short = 'c', global = true, env = "RWOGP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Never prompt; decline anything that needs an operator
    #[arg(long, global = true)]
    pub batch: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest every new survey report
    Run(RunArgs),

    /// Inspect or edit the upload inventory
    #[command(subcommand)]
    Inventory(InventoryCommands),

    /// Parse one report and write its metadata and feature table
    Parse(ParseArgs),

    /// Compute alignment offsets for one report
    Offsets(OffsetsArgs),

    /// Validate metadata files against the embedded schema
    Validate(ValidateArgs),

    /// Register a component in the inspection record
    Register(RegisterArgs),

    /// Configuration helpers
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
