use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pcat",
    about = "Product catalog store: publish server and maintenance tools",
    version
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
    /// Start the publish server
    Serve(ServeArgs),
    /// List files reachable from the given files that are absent
    Missing(MissingArgs),
    /// Delete files no longer reachable from root.json
    Prune(PruneArgs),
    /// Delete staged uploads older than a TTL
    Sweep(SweepArgs),
    /// Show the markers, trees and latest transaction of root.json, or one
    /// product with its tables and blobs
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Address to bind, overriding the configuration
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Directory holding one sub-directory per database
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct MissingArgs {
    /// Database directory
    pub db_dir: PathBuf,
    /// Files to resolve from (default: root.json)
    pub files: Vec<String>,
    /// Maximum reference depth below the given files
    #[arg(long, default_value_t = 10)]
    pub max_depth: usize,
}

#[derive(Args)]
pub struct PruneArgs {
    /// Database directory
    pub db_dir: PathBuf,
    /// List orphans without deleting them
    #[arg(long)]
    pub dry_run: bool,
    /// Maximum reference depth below root.json
    #[arg(long, default_value_t = 10)]
    pub max_depth: usize,
}

#[derive(Args)]
pub struct SweepArgs {
    /// Database directory
    pub db_dir: PathBuf,
    /// Age in seconds after which a staged upload is deleted
    #[arg(long, default_value_t = 24 * 60 * 60)]
    pub ttl_secs: u64,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Database directory
    pub db_dir: PathBuf,
    /// Show this product (by key) instead of the root summary
    #[arg(long)]
    pub product: Option<String>,
    /// Marker to look the product up in (default: latest transaction)
    #[arg(long, requires = "product")]
    pub marker: Option<String>,
}
