//! Streamed test result aggregation
//!
//! The engine reports per-test results as a stream of events that may repeat
//! a test id (retries, flaky sub-results) and may keep arriving after the
//! caller has stopped listening. [`ResultAggregator`] keeps the latest
//! terminal event per test id, records the run completion signal, and
//! freezes once a snapshot has been taken.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use stagehand_protocol::{EngineTestStatus, RunResult, TestResultEvent, TestResultItem, TestResultStatus};

/// Outcome of waiting for a run to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished(RunResult),
    TimedOut,
    Cancelled,
}

#[derive(Debug)]
struct Entry {
    /// Arrival order of the first event for this test id
    order: u64,
    item: TestResultItem,
}

/// Thread-safe collector for one test-run call
#[derive(Debug)]
pub struct ResultAggregator {
    results: DashMap<String, Entry>,
    sequence: AtomicU64,
    sealed: AtomicBool,
    completion: watch::Sender<Option<RunResult>>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        let (completion, _) = watch::channel(None);
        Self {
            results: DashMap::new(),
            sequence: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
            completion,
        }
    }

    /// Record a per-test event
    ///
    /// Non-terminal events are ignored. A repeated test id replaces the
    /// earlier result. Returns false when the event was not retained.
    pub fn record(&self, event: TestResultEvent) -> bool {
        if !event.status.is_terminal() {
            trace!(test_id = %event.test_id, status = ?event.status, "Ignoring non-terminal event");
            return false;
        }
        if self.sealed.load(Ordering::Acquire) {
            debug!(test_id = %event.test_id, "Dropping result that arrived after snapshot");
            return false;
        }

        let item = TestResultItem {
            status: to_result_status(&event),
            test_id: event.test_id,
            parent_id: event.parent_id,
            output: event.output,
            duration: event.duration,
        };

        match self.results.entry(item.test_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut existing) => {
                debug!(test_id = %item.test_id, "Replacing earlier result for test");
                existing.get_mut().item = item;
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let order = self.sequence.fetch_add(1, Ordering::Relaxed);
                vacant.insert(Entry { order, item });
            }
        }
        true
    }

    /// Record the run completion signal; only the first one counts
    pub fn finish(&self, result: RunResult) -> bool {
        self.completion.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(result);
            true
        })
    }

    pub fn is_finished(&self) -> bool {
        self.completion.borrow().is_some()
    }

    /// Wait for the run completion signal
    pub async fn finished(&self) -> RunResult {
        let mut rx = self.completion.subscribe();
        let result = rx.wait_for(Option::is_some).await.map(|r| *r);
        match result {
            Ok(Some(result)) => result,
            // The sender lives as long as `self`
            _ => std::future::pending().await,
        }
    }

    /// Wait for completion, `timeout` or `cancel`, whichever comes first
    pub async fn await_completion(&self, timeout: Duration, cancel: &CancellationToken) -> Completion {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Completion::Cancelled,
            result = self.finished() => Completion::Finished(result),
            _ = tokio::time::sleep(timeout) => Completion::TimedOut,
        }
    }

    /// Freeze the aggregator and return retained results in arrival order
    ///
    /// Events recorded after this call are dropped.
    pub fn snapshot(&self) -> Vec<TestResultItem> {
        self.sealed.store(true, Ordering::Release);

        let mut entries: Vec<(u64, TestResultItem)> = self
            .results
            .iter()
            .map(|entry| (entry.order, entry.item.clone()))
            .collect();
        entries.sort_by_key(|(order, _)| *order);
        entries.into_iter().map(|(_, item)| item).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Map an engine status onto a retained status
///
/// Statuses this build does not know are kept as inconclusive so one odd
/// event cannot sink the whole result set.
fn to_result_status(event: &TestResultEvent) -> TestResultStatus {
    match event.status {
        EngineTestStatus::Success => TestResultStatus::Success,
        EngineTestStatus::Failure => TestResultStatus::Failure,
        EngineTestStatus::Ignored => TestResultStatus::Ignored,
        EngineTestStatus::Inconclusive => TestResultStatus::Inconclusive,
        other => {
            warn!(test_id = %event.test_id, status = ?other, "Unexpected test status, treating as inconclusive");
            TestResultStatus::Inconclusive
        }
    }
}
