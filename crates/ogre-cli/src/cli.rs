use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ogre_frame::ByteOrder;

#[derive(Parser)]
#[command(
    name = "ogre",
    about = "OGRE object graph store tools",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rewrite a store under another channel count
    Reshard(ReshardArgs),
    /// List every frame of one data file
    Scan(ScanArgs),
    /// Show channel statistics of a store
    Inspect(InspectArgs),
    /// Rewrite live records into fresh files, dropping superseded records and gaps
    Consolidate(ConsolidateArgs),
}

#[derive(Args)]
pub struct ReshardArgs {
    /// Configuration of the existing store
    #[arg(long)]
    pub source: PathBuf,
    /// Configuration of the new, empty store
    #[arg(long)]
    pub target: PathBuf,
    /// Process source channels one at a time
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Data file to scan
    pub file: PathBuf,
    #[arg(long, default_value = "little")]
    pub byte_order: ByteOrder,
    /// Payload bytes to show per entity, in hex
    #[arg(long, default_value_t = 16)]
    pub dump: usize,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Store configuration
    pub config: PathBuf,
}

#[derive(Args)]
pub struct ConsolidateArgs {
    /// Store configuration
    pub config: PathBuf,
    /// Only this channel
    #[arg(long)]
    pub channel: Option<u32>,
}
