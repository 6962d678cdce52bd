//! CLI module
//!
//! Command-line interface for harvesting the quote listing.
//!
//! # Commands
//!
//! - `init` - Create (or recreate) the quote table
//! - `run` - Harvest the listing with the pagination driver
//! - `page` - Fetch and store a single page
//! - `config` - Print the effective configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, RunArgs};
pub use runner::{apply_run_args, harvest, open_store, Runner};
