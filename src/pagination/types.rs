//! Pagination types and traits
//!
//! Defines the outcome, batch, state and configuration types shared by the
//! driver and by page fetchers.

use crate::error::{Error, Result};
use crate::types::PageNumber;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Page Outcomes
// ============================================================================

/// Classification of one page attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Page retrieved and persisted
    Success,
    /// Retrieval or persistence failed; the page may succeed on a later run
    Failure,
    /// The source returned an empty or terminal page
    EndOfData,
}

impl PageStatus {
    /// Map a plain success flag (no end-of-data signal available)
    pub fn from_success(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// Check if this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Check if this is a transient failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Check if this is an end-of-data signal
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData)
    }
}

/// Result of attempting one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    /// Page number attempted
    pub page: PageNumber,
    /// How the attempt ended
    pub status: PageStatus,
}

impl PageOutcome {
    /// Create an outcome
    pub fn new(page: PageNumber, status: PageStatus) -> Self {
        Self { page, status }
    }

    /// Create a success outcome
    pub fn success(page: PageNumber) -> Self {
        Self::new(page, PageStatus::Success)
    }

    /// Create a failure outcome
    pub fn failure(page: PageNumber) -> Self {
        Self::new(page, PageStatus::Failure)
    }

    /// Create an end-of-data outcome
    pub fn end_of_data(page: PageNumber) -> Self {
        Self::new(page, PageStatus::EndOfData)
    }
}

/// Outcomes of one concurrently issued group of pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    outcomes: Vec<PageOutcome>,
}

impl BatchResult {
    /// Create a batch result; outcomes are kept in page order
    pub fn new(mut outcomes: Vec<PageOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.page);
        Self { outcomes }
    }

    /// All outcomes, ordered by page
    pub fn outcomes(&self) -> &[PageOutcome] {
        &self.outcomes
    }

    /// Number of attempts in the batch
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Check if the batch has no attempts
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of successful pages
    pub fn success_count(&self) -> usize {
        self.count(PageStatus::Success)
    }

    /// Number of transient failures
    pub fn failure_count(&self) -> usize {
        self.count(PageStatus::Failure)
    }

    /// Number of end-of-data pages
    pub fn end_of_data_count(&self) -> usize {
        self.count(PageStatus::EndOfData)
    }

    /// True when no page in a non-empty batch succeeded
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.success_count() == 0
    }

    /// True when at least one page signalled end of data
    pub fn saw_end_of_data(&self) -> bool {
        self.end_of_data_count() > 0
    }

    fn count(&self, status: PageStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

// ============================================================================
// Fetch Capability
// ============================================================================

/// Capability that attempts one page and reports how it went.
///
/// Implementations own every side effect (HTTP, decoding, persistence) and
/// must not fail: errors are reported as [`PageStatus::Failure`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and persist one page
    async fn fetch_page(&self, page: PageNumber) -> PageStatus;
}

// ============================================================================
// Termination
// ============================================================================

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedBy {
    /// A page signalled end of data
    EmptyPage,
    /// Consecutive fully-failed batches reached the retry budget
    MaxRetries,
    /// The configured page ceiling was reached
    PageLimit,
    /// Cancellation was requested between batches
    Cancelled,
}

impl fmt::Display for TerminatedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EmptyPage => "empty page",
            Self::MaxRetries => "retry budget exhausted",
            Self::PageLimit => "page limit reached",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What the driver does with [`PageStatus::EndOfData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfDataPolicy {
    /// Stop the run after the batch that saw the empty page
    #[default]
    Stop,
    /// Count empty pages as failures and let the retry budget end the run
    TreatAsFailure,
}

// ============================================================================
// Jitter
// ============================================================================

/// Uniform random delay taken before each page attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    /// Lower bound (inclusive)
    pub min: Duration,
    /// Upper bound (inclusive)
    pub max: Duration,
}

impl Default for Jitter {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1000),
            max: Duration::from_millis(3000),
        }
    }
}

impl Jitter {
    /// Create a jitter range
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Create a jitter range from milliseconds
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw one delay
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

// ============================================================================
// Driver Configuration
// ============================================================================

/// Parameters of one pagination run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// First page to schedule
    pub start_page: PageNumber,
    /// Batch size and concurrency cap
    pub max_concurrent: u32,
    /// Consecutive fully-failed batches tolerated
    pub max_failed_batches: u32,
    /// Delay drawn before each attempt
    pub jitter: Jitter,
    /// Optional number of pages after which the run stops
    pub max_pages: Option<u32>,
    /// Handling of end-of-data pages
    pub end_of_data: EndOfDataPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            max_concurrent: 3,
            max_failed_batches: 3,
            jitter: Jitter::default(),
            max_pages: None,
            end_of_data: EndOfDataPolicy::Stop,
        }
    }
}

impl DriverConfig {
    /// Create a new driver config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first page
    #[must_use]
    pub fn with_start_page(mut self, page: PageNumber) -> Self {
        self.start_page = page;
        self
    }

    /// Set the concurrency cap
    #[must_use]
    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_max_failed_batches(mut self, max: u32) -> Self {
        self.max_failed_batches = max;
        self
    }

    /// Set the jitter range
    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Cap the number of pages
    #[must_use]
    pub fn with_max_pages(mut self, max: Option<u32>) -> Self {
        self.max_pages = max;
        self
    }

    /// Set the end-of-data policy
    #[must_use]
    pub fn with_end_of_data(mut self, policy: EndOfDataPolicy) -> Self {
        self.end_of_data = policy;
        self
    }

    /// Reject parameters the driver cannot schedule
    pub fn validate(&self) -> Result<()> {
        if self.start_page == 0 {
            return Err(Error::scheduling("start_page must be at least 1"));
        }
        if self.max_concurrent == 0 {
            return Err(Error::scheduling("max_concurrent must be at least 1"));
        }
        if self.max_failed_batches == 0 {
            return Err(Error::scheduling("max_failed_batches must be at least 1"));
        }
        if self.jitter.min > self.jitter.max {
            return Err(Error::scheduling(format!(
                "jitter range is inverted ({:?} > {:?})",
                self.jitter.min, self.jitter.max
            )));
        }
        if self.max_pages == Some(0) {
            return Err(Error::scheduling("max_pages must be at least 1 when set"));
        }
        Ok(())
    }

    /// Last page the run may schedule, if a ceiling is set
    pub fn last_allowed_page(&self) -> Option<u64> {
        self.max_pages
            .map(|max| u64::from(self.start_page) + u64::from(max) - 1)
    }
}

// ============================================================================
// Driver State
// ============================================================================

/// Mutable run state, owned by the orchestrating task only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverState {
    next_page: u64,
    start_page: PageNumber,
    /// Consecutive batches without a single success
    pub consecutive_failed_batches: u32,
    /// Successful pages so far
    pub success_count: u64,
    /// Non-successful pages so far (end-of-data pages included)
    pub failure_count: u64,
    /// End-of-data pages so far
    pub empty_count: u64,
    /// Batches dispatched so far
    pub batches: u64,
    terminated_by: Option<TerminatedBy>,
}

impl DriverState {
    /// Create state for a run starting at `start_page`
    pub fn new(start_page: PageNumber) -> Self {
        Self {
            next_page: u64::from(start_page),
            start_page,
            consecutive_failed_batches: 0,
            success_count: 0,
            failure_count: 0,
            empty_count: 0,
            batches: 0,
            terminated_by: None,
        }
    }

    /// Next page that will be claimed
    pub fn next_page(&self) -> u64 {
        self.next_page
    }

    /// Claim up to `size` pages, never past `ceiling`.
    ///
    /// Pages are claimed before their outcome is known and `next_page`
    /// advances immediately, so no page number is handed out twice.
    pub fn claim_batch(&mut self, size: u32, ceiling: Option<u64>) -> Result<Vec<PageNumber>> {
        let mut end = self.next_page + u64::from(size);
        if let Some(last) = ceiling {
            end = end.min(last + 1).max(self.next_page);
        }

        let pages = (self.next_page..end)
            .map(|p| {
                PageNumber::try_from(p)
                    .map_err(|_| Error::scheduling(format!("page number {p} overflows")))
            })
            .collect::<Result<Vec<_>>>()?;

        self.next_page = end;
        Ok(pages)
    }

    /// Fold one joined batch into the counters
    pub fn record_batch(&mut self, batch: &BatchResult) {
        self.batches += 1;
        self.success_count += batch.success_count() as u64;
        self.failure_count += (batch.failure_count() + batch.end_of_data_count()) as u64;
        self.empty_count += batch.end_of_data_count() as u64;

        if batch.all_failed() {
            self.consecutive_failed_batches += 1;
        } else {
            self.consecutive_failed_batches = 0;
        }
    }

    /// Mark the run as finished; the first reason wins
    pub fn terminate(&mut self, reason: TerminatedBy) {
        self.terminated_by.get_or_insert(reason);
    }

    /// Check if the run has finished
    pub fn is_terminated(&self) -> bool {
        self.terminated_by.is_some()
    }

    /// Reason the run finished, if it has
    pub fn terminated_by(&self) -> Option<TerminatedBy> {
        self.terminated_by
    }

    /// Total attempts dispatched
    pub fn pages_dispatched(&self) -> u64 {
        self.next_page - u64::from(self.start_page)
    }

    /// Highest page number handed out (start - 1 when nothing ran)
    pub fn last_page_attempted(&self) -> u64 {
        self.next_page - 1
    }

    /// Build the run summary
    pub fn into_summary(self, elapsed: Duration) -> RunSummary {
        RunSummary {
            success_count: self.success_count,
            failure_count: self.failure_count,
            empty_count: self.empty_count,
            pages_dispatched: self.pages_dispatched(),
            batches: self.batches,
            consecutive_failed_batches: self.consecutive_failed_batches,
            last_page_attempted: self.last_page_attempted(),
            terminated_by: self.terminated_by.unwrap_or(TerminatedBy::Cancelled),
            elapsed,
        }
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages retrieved and persisted
    pub success_count: u64,
    /// Pages that did not succeed (end-of-data pages included)
    pub failure_count: u64,
    /// Pages that signalled end of data
    pub empty_count: u64,
    /// Total attempts dispatched
    pub pages_dispatched: u64,
    /// Batches dispatched
    pub batches: u64,
    /// Fully-failed batch streak at the time the run stopped
    pub consecutive_failed_batches: u32,
    /// Highest page number handed out
    pub last_page_attempted: u64,
    /// Why the run stopped
    pub terminated_by: TerminatedBy,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl RunSummary {
    /// Check if the retry budget ended the run
    pub fn budget_exhausted(&self) -> bool {
        self.terminated_by == TerminatedBy::MaxRetries
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success: {}, failed: {}, last page: {}, stopped: {}, took {:.2}s",
            self.success_count,
            self.failure_count,
            self.last_page_attempted,
            self.terminated_by,
            self.elapsed.as_secs_f64()
        )
    }
}
