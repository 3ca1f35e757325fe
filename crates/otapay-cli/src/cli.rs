use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "otapay",
    about = "Build unsigned full-image update payloads",
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

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a payload from partition images
    Build(BuildArgs),
    /// Show the header and manifest of a payload
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Output payload file [default: payload.bin]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Comma-separated list of partition:image pairs
    #[arg(short, long, conflicts_with_all = ["input", "config"])]
    pub partitions: Option<String>,
    /// Directory of partition images to pick up automatically
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// TOML file listing the output and partitions
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Image file extension used with --input
    #[arg(long)]
    pub extension: Option<String>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub payload: PathBuf,
}
