//! Test-run orchestration
//!
//! One call walks `WaitingForConnection -> Launching -> Collecting` and ends
//! completed, timed out, cancelled or failed. A transient engine disconnect
//! while collecting loops back through `WaitingForReconnection -> Launching`
//! with a fresh session, the same filter, and the same aggregator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stagehand_protocol::{AssemblyFilter, RunResult, RunTestsRequest, TestMode};

use super::error::{ConnectPhase, OrchestrationError, TimeoutStep, ASSEMBLY_NAMES_REQUIRED};
use crate::aggregator::ResultAggregator;
use crate::config::{ConfigHandle, TimeoutConfig};
use crate::connection::{ConnectionState, DisconnectReason};
use crate::engine::{EngineError, EngineHandle, EngineHost, LaunchSink, PendingCall, UnitTestLaunch};
use crate::response::TestRunSummary;

/// Stand-in horizon for budgets too large to add to the clock (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + budget`, clamped to [`FAR_FUTURE`] when the sum overflows
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A launch that has been handed to the engine
struct ActiveLaunch {
    session_id: Uuid,
    /// Ends the launch's result subscription
    lifetime: CancellationToken,
    /// The engine's answer to the start call
    started: PendingCall<()>,
}

/// Why collection for one attempt stopped
enum Collected {
    Finished(RunResult),
    Cancelled,
    TimedOut,
    Disconnected(DisconnectReason),
    StartFailed(EngineError),
}

/// Runs test launches against the connected engine
#[derive(Clone)]
pub struct TestRunOrchestrator {
    host: EngineHost,
    config: ConfigHandle,
}

impl TestRunOrchestrator {
    pub fn new(host: EngineHost, config: ConfigHandle) -> Self {
        Self { host, config }
    }

    /// Run tests and return the leaf-level summary
    ///
    /// `cancel` is the lifetime of the call; cancelling it aborts the launch
    /// on a best-effort basis and returns [`OrchestrationError::Cancelled`].
    pub async fn run_tests(
        &self,
        request: RunTestsRequest,
        cancel: CancellationToken,
    ) -> Result<TestRunSummary, OrchestrationError> {
        let filters = validate(&request)?;
        let timeouts = self.config.load().timeouts.clone();
        let deadline = deadline_after(timeouts.test_run());
        let mode = request.mode;

        info!(
            %mode,
            assemblies = filters.len(),
            timeout_secs = timeouts.test_run_secs,
            "Test run requested"
        );

        let mut engine = self
            .await_engine(ConnectPhase::Initial, timeouts.connect(), deadline, &timeouts, &cancel)
            .await?;

        let aggregator = Arc::new(ResultAggregator::new());
        let mut attempt: u32 = 1;

        loop {
            // Subscribe before launching so a disconnect in between is seen
            let mut state_rx = self.host.monitor().subscribe();

            let collected = match self.launch(&engine, mode, &filters, &aggregator).await {
                Ok(launch) => {
                    info!(session_id = %launch.session_id, attempt, "Launch submitted, collecting results");
                    let collected = collect(
                        &aggregator,
                        &mut state_rx,
                        &engine,
                        launch.started,
                        deadline,
                        &cancel,
                    )
                    .await;
                    Some((launch.session_id, launch.lifetime, collected))
                }
                Err(e) => {
                    if self.host.monitor().current().is_connected_to(&engine) {
                        warn!(error = %e, attempt, "Failed to submit test launch");
                        return Err(OrchestrationError::Engine(e));
                    }
                    warn!(error = %e, attempt, "Launch failed while engine was going away");
                    None
                }
            };

            let disconnect = match collected {
                Some((session_id, lifetime, collected)) => match collected {
                    Collected::Finished(run_result) => {
                        lifetime.cancel();
                        let results = aggregator.snapshot();
                        let summary = TestRunSummary::from_results(&results);
                        info!(
                            %session_id,
                            attempt,
                            engine_passed = run_result.passed,
                            pass = summary.pass_count,
                            fail = summary.fail_count,
                            skip = summary.skip_count,
                            inconclusive = summary.inconclusive_count,
                            "Test run completed"
                        );
                        return Ok(summary);
                    }
                    Collected::Cancelled => {
                        info!(%session_id, attempt, "Test run cancelled");
                        self.abort(&engine, session_id, lifetime, &timeouts).await;
                        return Err(OrchestrationError::Cancelled);
                    }
                    Collected::TimedOut => {
                        warn!(%session_id, attempt, timeout_secs = timeouts.test_run_secs, "Test run timed out");
                        self.abort(&engine, session_id, lifetime, &timeouts).await;
                        return Err(OrchestrationError::TimedOut {
                            step: TimeoutStep::TestRun,
                            elapsed: timeouts.test_run(),
                        });
                    }
                    Collected::StartFailed(e) => {
                        lifetime.cancel();
                        warn!(%session_id, attempt, error = %e, "Engine refused to start the launch");
                        return Err(OrchestrationError::Engine(e));
                    }
                    Collected::Disconnected(reason) => {
                        lifetime.cancel();
                        info!(%session_id, attempt, ?reason, "Engine disconnected during test run");
                        reason
                    }
                },
                None => self
                    .host
                    .monitor()
                    .current()
                    .disconnect_reason()
                    .unwrap_or(DisconnectReason::Transient),
            };

            if disconnect == DisconnectReason::Closed {
                return Err(OrchestrationError::ConnectionClosed);
            }

            info!(
                attempt,
                reconnect_secs = timeouts.reconnect_secs,
                "Waiting for engine to reconnect"
            );
            engine = self
                .await_engine(ConnectPhase::MidRun, timeouts.reconnect(), deadline, &timeouts, &cancel)
                .await?;
            attempt += 1;
            info!(attempt, recorded = aggregator.len(), "Engine reconnected, relaunching");
        }
    }

    /// Wait for a connected engine, bounded by `budget` and the call deadline
    async fn await_engine(
        &self,
        phase: ConnectPhase,
        budget: Duration,
        deadline: Instant,
        timeouts: &TimeoutConfig,
        cancel: &CancellationToken,
    ) -> Result<EngineHandle, OrchestrationError> {
        let monitor = self.host.monitor().clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(?phase, "Cancelled while waiting for engine");
                Err(OrchestrationError::Cancelled)
            }
            _ = sleep_until(deadline) => {
                warn!(?phase, "Test run timed out while waiting for engine");
                Err(OrchestrationError::TimedOut {
                    step: TimeoutStep::TestRun,
                    elapsed: timeouts.test_run(),
                })
            }
            handle = monitor.wait_for_connection(budget) => match handle {
                Some(handle) => Ok(handle),
                None => {
                    warn!(?phase, waited_secs = budget.as_secs(), "Engine did not connect in time");
                    Err(OrchestrationError::ConnectionTimedOut { phase, waited: budget })
                }
            },
        }
    }

    /// Install and start a launch with a fresh session on the owner context
    ///
    /// The launch carries its result sink, so the subscription exists before
    /// the engine can report anything.
    async fn launch(
        &self,
        engine: &EngineHandle,
        mode: TestMode,
        filters: &[AssemblyFilter],
        aggregator: &Arc<ResultAggregator>,
    ) -> Result<ActiveLaunch, EngineError> {
        let session_id = Uuid::new_v4();
        let lifetime = CancellationToken::new();
        let sink = LaunchSink::new(session_id, aggregator.clone(), lifetime.clone());
        let launch = UnitTestLaunch::new(mode, filters.to_vec(), sink);

        debug!(%session_id, %mode, "Submitting test launch");
        let handle = engine.clone();
        let started = self
            .host
            .dispatcher()
            .call_on_owner(move || {
                handle.set_unit_test_launch(launch)?;
                handle.run_unit_test_launch()
            })
            .await;

        match started {
            Ok(started) => Ok(ActiveLaunch {
                session_id,
                lifetime,
                started,
            }),
            Err(e) => {
                lifetime.cancel();
                Err(e)
            }
        }
    }

    /// Best-effort abort of `session_id`; failures are only logged
    ///
    /// Skipped when the engine is running a different session by now.
    async fn abort(
        &self,
        engine: &EngineHandle,
        session_id: Uuid,
        lifetime: CancellationToken,
        timeouts: &TimeoutConfig,
    ) {
        lifetime.cancel();

        let handle = engine.clone();
        let requested = self
            .host
            .dispatcher()
            .call_on_owner(move || match handle.current_launch_session() {
                Some(current) if current == session_id => handle.abort_launch(session_id).map(Some),
                _ => Ok(None),
            })
            .await;

        let call = match requested {
            Ok(Some(call)) => call,
            Ok(None) => {
                debug!(%session_id, "Engine is running another launch, not aborting");
                return;
            }
            Err(e) => {
                warn!(%session_id, error = %e, "Failed to request launch abort");
                return;
            }
        };

        match tokio::time::timeout(timeouts.abort(), call.wait()).await {
            Ok(Ok(())) => info!(%session_id, "Launch aborted"),
            Ok(Err(e)) => warn!(%session_id, error = %e, "Launch abort failed"),
            Err(_) => warn!(%session_id, "Launch abort did not complete in time"),
        }
    }
}

/// Reject requests without a usable assembly name and expand the filter
fn validate(request: &RunTestsRequest) -> Result<Vec<AssemblyFilter>, OrchestrationError> {
    let filters = request.filter.to_assembly_filters();
    if filters.is_empty() {
        return Err(OrchestrationError::invalid_request(ASSEMBLY_NAMES_REQUIRED));
    }
    Ok(filters)
}

/// Collect results for one attempt until something ends it
async fn collect(
    aggregator: &ResultAggregator,
    state_rx: &mut watch::Receiver<ConnectionState>,
    engine: &EngineHandle,
    started: PendingCall<()>,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Collected {
    let started = started.wait();
    tokio::pin!(started);
    let mut start_settled = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Collected::Cancelled,
            run_result = aggregator.finished() => return Collected::Finished(run_result),
            _ = sleep_until(deadline) => return Collected::TimedOut,
            reason = wait_for_disconnect(state_rx, engine) => return Collected::Disconnected(reason),
            result = &mut started, if !start_settled => {
                start_settled = true;
                match result {
                    Ok(()) => debug!("Engine accepted the launch"),
                    // Usually a reload; the disconnect branch takes over
                    Err(EngineError::CallDropped) => debug!("Start call dropped by engine"),
                    Err(e) => return Collected::StartFailed(e),
                }
            }
        }
    }
}

/// Resolve once `engine` is no longer the connected engine
async fn wait_for_disconnect(
    state_rx: &mut watch::Receiver<ConnectionState>,
    engine: &EngineHandle,
) -> DisconnectReason {
    let changed = state_rx
        .wait_for(|state| !state.is_connected_to(engine))
        .await
        .map(|state| state.disconnect_reason());

    match changed {
        Ok(Some(reason)) => reason,
        // Replaced by a new engine before we looked: the old one reloaded
        Ok(None) => DisconnectReason::Transient,
        Err(_) => DisconnectReason::Closed,
    }
}
