// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # quote-harvest
//!
//! Harvests a paginated equity quote listing into DuckDB.
//!
//! ## Features
//!
//! - **Bounded-concurrency pagination**: pages fetched in batches behind a
//!   semaphore, with random jitter before each attempt
//! - **Clear termination**: stops on an empty page, after a budget of fully
//!   failed batches, at an optional page ceiling, or on cancellation
//! - **Upserts**: rows keyed by `(stock_code, update_time)`, written in
//!   chunked transactions over a bounded connection pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quote_harvest::config::HarvestConfig;
//! use quote_harvest::cli::harvest;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> quote_harvest::Result<()> {
//!     let config = HarvestConfig::load(None)?;
//!     config.validate()?;
//!     let summary = harvest(&config, CancellationToken::new()).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   PaginationDriver                       │
//! │   claim batch → dispatch (jitter, permit) → join → judge │
//! └──────────────────────────────────────────────────────────┘
//!                             │ PageFetcher
//! ┌───────────────┬───────────┴───────┬──────────────────────┐
//! │ ListingSource │  ListingDecoder   │        Store         │
//! ├───────────────┼───────────────────┼──────────────────────┤
//! │ HTTP + retry  │ empty / records   │ connection pool      │
//! │ rate limit    │ record → QuoteRow │ schema bootstrap     │
//! │ LRU cache     │ dedupe by code    │ chunked upsert       │
//! └───────────────┴───────────────────┴──────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Bounded-concurrency pagination driver
pub mod pagination;

/// Listing response decoding and row mapping
pub mod decode;

/// Page fetching: source, cache and harvester
pub mod fetch;

/// DuckDB pool, schema and upserts
pub mod store;

/// Layered configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::HarvestConfig;
pub use pagination::{PageFetcher, PageStatus, PaginationDriver, RunSummary, TerminatedBy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
