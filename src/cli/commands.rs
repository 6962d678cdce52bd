//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Harvest a paginated quote listing into DuckDB
#[derive(Parser, Debug)]
#[command(name = "quote-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overrides configuration
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the quote table
    Init {
        /// Drop the existing table first
        #[arg(long)]
        drop_existing: bool,

        /// Attempts before giving up
        #[arg(long, default_value = "3")]
        attempts: u32,

        /// Seconds between attempts
        #[arg(long, default_value = "5")]
        retry_delay_secs: u64,
    },

    /// Harvest the listing until it runs out or keeps failing
    Run(RunArgs),

    /// Fetch and store a single page
    Page {
        /// Page number (1-based)
        page: u32,
    },

    /// Print the effective configuration
    Config,
}

/// Overrides for a harvest run
#[derive(clap::Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// First page to fetch
    #[arg(long)]
    pub start_page: Option<u32>,

    /// Pages fetched concurrently per batch
    #[arg(long)]
    pub max_concurrent: Option<u32>,

    /// Consecutive fully-failed batches before stopping
    #[arg(long)]
    pub max_failed_batches: Option<u32>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Minimum delay before each page (ms)
    #[arg(long)]
    pub jitter_min_ms: Option<u64>,

    /// Maximum delay before each page (ms)
    #[arg(long)]
    pub jitter_max_ms: Option<u64>,

    /// Count empty pages as failures instead of stopping on them
    #[arg(long)]
    pub legacy_empty_pages: bool,
}
