//! Pagination module
//!
//! The bounded-concurrency pagination driver and the types it shares with
//! page fetchers.
//!
//! # Overview
//!
//! A run claims `max_concurrent` page numbers at a time, fetches them
//! concurrently behind a semaphore, joins the batch and then decides whether
//! to continue:
//!
//! - an end-of-data page stops the run (`TerminatedBy::EmptyPage`)
//! - `max_failed_batches` consecutive batches without a success stop the run
//!   (`TerminatedBy::MaxRetries`)
//! - an optional page ceiling stops the run (`TerminatedBy::PageLimit`)
//! - cancellation is honoured between batches (`TerminatedBy::Cancelled`)

mod driver;
mod types;

pub use driver::{termination_check, PaginationDriver};
pub use types::{
    BatchResult, DriverConfig, DriverState, EndOfDataPolicy, Jitter, PageFetcher, PageOutcome,
    PageStatus, RunSummary, TerminatedBy,
};

#[cfg(test)]
mod tests;
