//! Tests for pagination module

use super::*;
use crate::error::Error;
use crate::types::PageNumber;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_case::test_case;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Fetcher
// ============================================================================

type Script = Box<dyn Fn(PageNumber) -> PageStatus + Send + Sync>;

/// Fetcher whose outcome per page is decided by a closure
struct ScriptedFetcher {
    script: Script,
    delay: Duration,
    calls: Mutex<Vec<PageNumber>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    cancel_at: Option<(PageNumber, CancellationToken)>,
}

impl ScriptedFetcher {
    fn new(script: impl Fn(PageNumber) -> PageStatus + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            cancel_at: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn cancelling_at(mut self, page: PageNumber, token: CancellationToken) -> Self {
        self.cancel_at = Some((page, token));
        self
    }

    fn calls(&self) -> Vec<PageNumber> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_unstable();
        calls
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, page: PageNumber) -> PageStatus {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(page);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((at, token)) = &self.cancel_at {
            if *at == page {
                token.cancel();
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.script)(page)
    }
}

fn config(max_concurrent: u32, max_failed_batches: u32) -> DriverConfig {
    DriverConfig::new()
        .with_max_concurrent(max_concurrent)
        .with_max_failed_batches(max_failed_batches)
        .with_jitter(Jitter::none())
}

// ============================================================================
// Outcome / Batch Tests
// ============================================================================

#[test]
fn test_page_status_from_success() {
    assert_eq!(PageStatus::from_success(true), PageStatus::Success);
    assert_eq!(PageStatus::from_success(false), PageStatus::Failure);
    assert!(PageStatus::EndOfData.is_end_of_data());
    assert!(!PageStatus::EndOfData.is_failure());
}

#[test]
fn test_batch_result_orders_and_counts() {
    let batch = BatchResult::new(vec![
        PageOutcome::failure(3),
        PageOutcome::success(1),
        PageOutcome::end_of_data(4),
        PageOutcome::success(2),
    ]);

    let pages: Vec<_> = batch.outcomes().iter().map(|o| o.page).collect();
    assert_eq!(pages, vec![1, 2, 3, 4]);
    assert_eq!(batch.success_count(), 2);
    assert_eq!(batch.failure_count(), 1);
    assert_eq!(batch.end_of_data_count(), 1);
    assert!(!batch.all_failed());
    assert!(batch.saw_end_of_data());
}

#[test]
fn test_batch_all_failed() {
    let batch = BatchResult::new(vec![PageOutcome::failure(1), PageOutcome::end_of_data(2)]);
    assert!(batch.all_failed());

    assert!(!BatchResult::default().all_failed());
}

// ============================================================================
// DriverState Tests
// ============================================================================

#[test]
fn test_claim_batch_advances_next_page() {
    let mut state = DriverState::new(5);

    assert_eq!(state.claim_batch(3, None).unwrap(), vec![5, 6, 7]);
    assert_eq!(state.claim_batch(3, None).unwrap(), vec![8, 9, 10]);
    assert_eq!(state.next_page(), 11);
    assert_eq!(state.pages_dispatched(), 6);
    assert_eq!(state.last_page_attempted(), 10);
}

#[test]
fn test_claim_batch_respects_ceiling() {
    let mut state = DriverState::new(1);

    assert_eq!(state.claim_batch(3, Some(4)).unwrap(), vec![1, 2, 3]);
    assert_eq!(state.claim_batch(3, Some(4)).unwrap(), vec![4]);
    assert!(state.claim_batch(3, Some(4)).unwrap().is_empty());
    assert_eq!(state.next_page(), 5);
}

#[test]
fn test_claim_batch_overflow_is_a_scheduling_fault() {
    let mut state = DriverState::new(PageNumber::MAX);

    let err = state.claim_batch(2, None).unwrap_err();
    assert!(matches!(err, Error::Scheduling { .. }));
}

#[test]
fn test_record_batch_resets_streak_on_success() {
    let mut state = DriverState::new(1);

    state.record_batch(&BatchResult::new(vec![
        PageOutcome::failure(1),
        PageOutcome::failure(2),
    ]));
    assert_eq!(state.consecutive_failed_batches, 1);

    state.record_batch(&BatchResult::new(vec![
        PageOutcome::failure(3),
        PageOutcome::success(4),
    ]));
    assert_eq!(state.consecutive_failed_batches, 0);
    assert_eq!(state.success_count, 1);
    assert_eq!(state.failure_count, 3);
    assert_eq!(state.batches, 2);
}

#[test]
fn test_terminate_keeps_first_reason() {
    let mut state = DriverState::new(1);
    state.terminate(TerminatedBy::EmptyPage);
    state.terminate(TerminatedBy::MaxRetries);
    assert_eq!(state.terminated_by(), Some(TerminatedBy::EmptyPage));
}

// ============================================================================
// Termination Policy Tests
// ============================================================================

#[test_case(vec![PageOutcome::success(1), PageOutcome::end_of_data(2)], 0, None => Some(TerminatedBy::EmptyPage); "end of data stops")]
#[test_case(vec![PageOutcome::failure(1), PageOutcome::failure(2)], 3, None => Some(TerminatedBy::MaxRetries); "budget exhausted")]
#[test_case(vec![PageOutcome::failure(1), PageOutcome::failure(2)], 2, None => None; "budget not yet exhausted")]
#[test_case(vec![PageOutcome::success(1), PageOutcome::success(2)], 0, Some(2) => Some(TerminatedBy::PageLimit); "ceiling reached")]
#[test_case(vec![PageOutcome::success(1), PageOutcome::success(2)], 0, Some(10) => None; "ceiling ahead")]
#[test_case(vec![PageOutcome::end_of_data(1), PageOutcome::end_of_data(2)], 3, None => Some(TerminatedBy::EmptyPage); "end of data wins over budget")]
fn test_termination_check(
    outcomes: Vec<PageOutcome>,
    streak: u32,
    ceiling: Option<u64>,
) -> Option<TerminatedBy> {
    let config = config(2, 3);
    let mut state = DriverState::new(1);
    state.claim_batch(2, None).unwrap();
    state.consecutive_failed_batches = streak;

    termination_check(&config, &state, &BatchResult::new(outcomes), ceiling)
}

// ============================================================================
// DriverConfig Tests
// ============================================================================

#[test]
fn test_driver_config_default() {
    let config = DriverConfig::default();
    assert_eq!(config.start_page, 1);
    assert_eq!(config.max_concurrent, 3);
    assert_eq!(config.max_failed_batches, 3);
    assert_eq!(config.jitter, Jitter::from_millis(1000, 3000));
    assert_eq!(config.max_pages, None);
    assert_eq!(config.end_of_data, EndOfDataPolicy::Stop);
    assert!(config.validate().is_ok());
}

#[test_case(DriverConfig::new().with_start_page(0); "zero start page")]
#[test_case(DriverConfig::new().with_max_concurrent(0); "zero concurrency")]
#[test_case(DriverConfig::new().with_max_failed_batches(0); "zero budget")]
#[test_case(DriverConfig::new().with_max_pages(Some(0)); "zero page ceiling")]
#[test_case(DriverConfig::new().with_jitter(Jitter::from_millis(500, 100)); "inverted jitter")]
fn test_driver_config_rejects(config: DriverConfig) {
    let err = config.validate().unwrap_err();
    assert!(matches!(err, Error::Scheduling { .. }));
}

#[test]
fn test_jitter_sample_within_bounds() {
    let jitter = Jitter::from_millis(10, 20);
    for _ in 0..100 {
        let d = jitter.sample();
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
    }
    assert_eq!(Jitter::none().sample(), Duration::ZERO);
}

// ============================================================================
// Driver Run Tests
// ============================================================================

#[tokio::test]
async fn test_run_succeeds_then_fails_until_budget() {
    // Pages 1-4 succeed, everything after fails
    let fetcher = Arc::new(ScriptedFetcher::new(|page| PageStatus::from_success(page <= 4)));
    let driver = PaginationDriver::new(config(2, 2));

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert_eq!(summary.success_count, 4);
    assert_eq!(summary.failure_count, 4);
    assert_eq!(summary.terminated_by, TerminatedBy::MaxRetries);
    assert_eq!(summary.last_page_attempted, 8);
    assert_eq!(summary.batches, 4);
    assert!(summary.budget_exhausted());
    assert_eq!(fetcher.calls(), (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_run_never_stops_while_pages_succeed() {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| PageStatus::Success));
    let driver = PaginationDriver::new(config(3, 3));

    let result =
        tokio::time::timeout(Duration::from_millis(200), driver.run(Arc::clone(&fetcher))).await;

    assert!(result.is_err(), "run should still be going");
    assert!(fetcher.calls().len() > 3);
}

#[tokio::test]
async fn test_run_stops_at_page_ceiling() {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| PageStatus::Success));
    let driver = PaginationDriver::new(config(3, 3).with_max_pages(Some(10)));

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert_eq!(summary.terminated_by, TerminatedBy::PageLimit);
    assert_eq!(summary.success_count, 10);
    assert_eq!(summary.pages_dispatched, 10);
    assert_eq!(summary.batches, 4);
    assert_eq!(summary.last_page_attempted, 10);
}

#[tokio::test]
async fn test_single_failure_in_batch_resets_streak() {
    let fetcher = Arc::new(ScriptedFetcher::new(|page| PageStatus::from_success(page != 3)));
    let driver = PaginationDriver::new(config(5, 1).with_max_pages(Some(5)));

    let summary = driver.run(fetcher).await.unwrap();

    assert_eq!(summary.success_count, 4);
    assert_eq!(summary.failure_count, 1);
    assert_eq!(summary.consecutive_failed_batches, 0);
    assert_eq!(summary.terminated_by, TerminatedBy::PageLimit);
}

#[test_case(1, 1)]
#[test_case(2, 3)]
#[test_case(3, 4)]
#[tokio::test]
async fn test_all_failing_batches_dispatch_exactly_budget(max_failed: u32, concurrency: u32) {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| PageStatus::Failure));
    let driver = PaginationDriver::new(config(concurrency, max_failed));

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert_eq!(summary.batches, u64::from(max_failed));
    assert_eq!(summary.pages_dispatched, u64::from(max_failed * concurrency));
    assert_eq!(summary.success_count, 0);
    assert_eq!(
        summary.success_count + summary.failure_count,
        summary.pages_dispatched
    );
    assert_eq!(summary.terminated_by, TerminatedBy::MaxRetries);
}

#[tokio::test]
async fn test_end_of_data_stops_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(|page| {
        if page <= 7 {
            PageStatus::Success
        } else {
            PageStatus::EndOfData
        }
    }));
    let driver = PaginationDriver::new(config(3, 3));

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert_eq!(summary.terminated_by, TerminatedBy::EmptyPage);
    assert_eq!(summary.success_count, 7);
    assert_eq!(summary.failure_count, 2);
    assert_eq!(summary.empty_count, 2);
    assert_eq!(summary.last_page_attempted, 9);
    assert_eq!(fetcher.calls(), (1..=9).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_legacy_policy_waits_out_budget_on_empty_pages() {
    let fetcher = Arc::new(ScriptedFetcher::new(|page| {
        if page <= 7 {
            PageStatus::Success
        } else {
            PageStatus::EndOfData
        }
    }));
    let driver =
        PaginationDriver::new(config(3, 2).with_end_of_data(EndOfDataPolicy::TreatAsFailure));

    let summary = driver.run(fetcher).await.unwrap();

    // [7,8,9] still has a success; [10..12] and [13..15] exhaust the budget
    assert_eq!(summary.terminated_by, TerminatedBy::MaxRetries);
    assert_eq!(summary.success_count, 7);
    assert_eq!(summary.failure_count, 8);
    assert_eq!(summary.last_page_attempted, 15);
}

#[tokio::test]
async fn test_no_page_dispatched_twice() {
    let fetcher = Arc::new(ScriptedFetcher::new(|page| {
        PageStatus::from_success(page % 4 != 0 && page < 30)
    }));
    let driver = PaginationDriver::new(config(4, 2).with_start_page(3));

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    let calls = fetcher.calls();
    let unique: HashSet<_> = calls.iter().copied().collect();
    assert_eq!(unique.len(), calls.len());
    assert_eq!(calls.first(), Some(&3));
    assert_eq!(calls.len() as u64, summary.pages_dispatched);
    assert_eq!(
        summary.success_count + summary.failure_count,
        summary.pages_dispatched
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_never_exceeds_cap() {
    let fetcher = Arc::new(
        ScriptedFetcher::new(|page| PageStatus::from_success(page <= 12))
            .with_delay(Duration::from_millis(20)),
    );
    let driver = PaginationDriver::new(
        config(3, 2).with_jitter(Jitter::from_millis(0, 5)),
    );

    driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert!(fetcher.peak() <= 3, "peak in flight was {}", fetcher.peak());
    assert!(fetcher.peak() >= 1);
}

#[tokio::test]
async fn test_panicking_attempt_counts_as_failure() {
    let fetcher = Arc::new(ScriptedFetcher::new(|page| {
        if page == 2 {
            panic!("boom on page 2");
        }
        PageStatus::from_success(page <= 4)
    }));
    let driver = PaginationDriver::new(config(2, 1));

    let summary = driver.run(fetcher).await.unwrap();

    // [1,2] and [3,4] each hold a success; [5,6] exhausts the budget
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failure_count, 3);
    assert_eq!(summary.last_page_attempted, 6);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();

    let fetcher = Arc::new(ScriptedFetcher::new(|_| PageStatus::Success));
    let driver = PaginationDriver::new(config(3, 3).with_start_page(10)).with_cancellation(token);

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert_eq!(summary.terminated_by, TerminatedBy::Cancelled);
    assert_eq!(summary.pages_dispatched, 0);
    assert_eq!(summary.last_page_attempted, 9);
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_lets_batch_finish() {
    let token = CancellationToken::new();
    let fetcher = Arc::new(
        ScriptedFetcher::new(|_| PageStatus::Success).cancelling_at(3, token.clone()),
    );
    let driver = PaginationDriver::new(config(2, 3)).with_cancellation(token);

    let summary = driver.run(Arc::clone(&fetcher)).await.unwrap();

    assert_eq!(summary.terminated_by, TerminatedBy::Cancelled);
    assert_eq!(summary.success_count, 4);
    assert_eq!(fetcher.calls(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_invalid_config_aborts_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| PageStatus::Success));
    let driver = PaginationDriver::new(config(0, 3));

    let err = driver.run(Arc::clone(&fetcher)).await.unwrap_err();

    assert!(matches!(err, Error::Scheduling { .. }));
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_page_overflow_aborts_run() {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| PageStatus::Success));
    let driver = PaginationDriver::new(config(2, 3).with_start_page(PageNumber::MAX - 1));

    let err = driver.run(Arc::clone(&fetcher)).await.unwrap_err();

    assert!(matches!(err, Error::Scheduling { .. }));
    assert_eq!(fetcher.calls(), vec![PageNumber::MAX - 1, PageNumber::MAX]);
}

#[test]
fn test_run_summary_display() {
    let mut state = DriverState::new(1);
    state.claim_batch(2, None).unwrap();
    state.record_batch(&BatchResult::new(vec![
        PageOutcome::success(1),
        PageOutcome::end_of_data(2),
    ]));
    state.terminate(TerminatedBy::EmptyPage);

    let summary = state.into_summary(Duration::from_millis(1500));
    assert_eq!(
        summary.to_string(),
        "success: 1, failed: 1, last page: 2, stopped: empty page, took 1.50s"
    );
}
