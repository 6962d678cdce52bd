//! Bounded-concurrency pagination driver
//!
//! Claims fixed-size batches of page numbers, runs every page of a batch as
//! its own task behind a run-wide semaphore, joins the batch, folds the
//! outcomes into [`DriverState`] and applies the termination policy.
//! Batches run strictly one after another.

use super::types::{
    BatchResult, DriverConfig, DriverState, EndOfDataPolicy, PageFetcher, PageOutcome,
    PageStatus, RunSummary, TerminatedBy,
};
use crate::error::Result;
use crate::types::PageNumber;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives a [`PageFetcher`] across an open-ended page range
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    config: DriverConfig,
    cancel: CancellationToken,
}

impl PaginationDriver {
    /// Create a driver with its own (never cancelled) token
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop scheduling new batches once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run until end of data, budget exhaustion, the page ceiling or
    /// cancellation.
    ///
    /// Only a scheduling fault (bad parameters, page-number overflow) returns
    /// an error; page failures are counted in the summary.
    pub async fn run<F>(&self, fetcher: Arc<F>) -> Result<RunSummary>
    where
        F: PageFetcher + ?Sized + 'static,
    {
        self.config.validate()?;

        let started = Instant::now();
        let ceiling = self.config.last_allowed_page();
        let gate = Arc::new(Semaphore::new(self.config.max_concurrent as usize));
        let mut state = DriverState::new(self.config.start_page);

        info!(
            start_page = self.config.start_page,
            max_concurrent = self.config.max_concurrent,
            max_failed_batches = self.config.max_failed_batches,
            max_pages = ?self.config.max_pages,
            "Starting pagination run"
        );

        while !state.is_terminated() {
            if self.cancel.is_cancelled() {
                warn!(
                    next_page = state.next_page(),
                    "Cancellation requested, not scheduling further batches"
                );
                state.terminate(TerminatedBy::Cancelled);
                break;
            }

            let pages = state.claim_batch(self.config.max_concurrent, ceiling)?;
            if pages.is_empty() {
                state.terminate(TerminatedBy::PageLimit);
                break;
            }

            let batch = self.dispatch_batch(&pages, &fetcher, &gate).await;
            let batch = self.apply_policy(batch);
            state.record_batch(&batch);

            debug!(
                first_page = pages[0],
                size = batch.len(),
                succeeded = batch.success_count(),
                failed = batch.failure_count(),
                empty = batch.end_of_data_count(),
                "Batch complete"
            );

            if batch.all_failed() {
                warn!(
                    "Every page in the batch failed, consecutive failed batches: {}/{}",
                    state.consecutive_failed_batches, self.config.max_failed_batches
                );
            }

            if let Some(reason) = termination_check(&self.config, &state, &batch, ceiling) {
                if reason == TerminatedBy::MaxRetries {
                    error!(
                        "Reached the maximum of {} consecutive failed batches, stopping",
                        self.config.max_failed_batches
                    );
                }
                state.terminate(reason);
            }
        }

        let summary = state.into_summary(started.elapsed());
        info!(
            success = summary.success_count,
            failed = summary.failure_count,
            last_page = summary.last_page_attempted,
            terminated_by = %summary.terminated_by,
            "Pagination run finished"
        );
        Ok(summary)
    }

    /// Spawn one task per page and wait for all of them
    async fn dispatch_batch<F>(
        &self,
        pages: &[PageNumber],
        fetcher: &Arc<F>,
        gate: &Arc<Semaphore>,
    ) -> BatchResult
    where
        F: PageFetcher + ?Sized + 'static,
    {
        let handles: Vec<_> = pages
            .iter()
            .map(|&page| {
                let fetcher = Arc::clone(fetcher);
                let gate = Arc::clone(gate);
                let delay = self.config.jitter.sample();

                let handle = tokio::spawn(async move {
                    // The delay is taken before the permit so it never holds a slot
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let Ok(_permit) = gate.acquire_owned().await else {
                        return PageOutcome::failure(page);
                    };
                    debug!(page, "Fetching page");
                    PageOutcome::new(page, fetcher.fetch_page(page).await)
                });
                (page, handle)
            })
            .collect();

        let outcomes = join_all(handles.into_iter().map(|(page, handle)| async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(page, "Page attempt aborted: {e}");
                    PageOutcome::failure(page)
                }
            }
        }))
        .await;

        BatchResult::new(outcomes)
    }

    /// Rewrite end-of-data outcomes when the legacy policy is active
    fn apply_policy(&self, batch: BatchResult) -> BatchResult {
        match self.config.end_of_data {
            EndOfDataPolicy::Stop => batch,
            EndOfDataPolicy::TreatAsFailure => BatchResult::new(
                batch
                    .outcomes()
                    .iter()
                    .map(|o| match o.status {
                        PageStatus::EndOfData => PageOutcome::failure(o.page),
                        _ => *o,
                    })
                    .collect(),
            ),
        }
    }
}

/// Decide whether the run ends after `batch` has been recorded.
///
/// End of data wins over budget exhaustion, which wins over the page ceiling.
pub fn termination_check(
    config: &DriverConfig,
    state: &DriverState,
    batch: &BatchResult,
    ceiling: Option<u64>,
) -> Option<TerminatedBy> {
    if config.end_of_data == EndOfDataPolicy::Stop && batch.saw_end_of_data() {
        return Some(TerminatedBy::EmptyPage);
    }
    if state.consecutive_failed_batches >= config.max_failed_batches {
        return Some(TerminatedBy::MaxRetries);
    }
    if ceiling.is_some_and(|last| state.next_page() > last) {
        return Some(TerminatedBy::PageLimit);
    }
    None
}
