//! Compilation check: refresh, wait for the engine to settle, query the result

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stagehand_protocol::RefreshKind;

use super::error::{ConnectPhase, OrchestrationError, TimeoutStep};
use crate::config::{ConfigHandle, TimeoutConfig};
use crate::console_log::ConsoleLogCollector;
use crate::engine::EngineHost;
use crate::response::CompilationResult;

/// Triggers a recompile and reports whether it succeeded
#[derive(Clone)]
pub struct CompilationCheckOrchestrator {
    host: EngineHost,
    config: ConfigHandle,
}

impl CompilationCheckOrchestrator {
    pub fn new(host: EngineHost, config: ConfigHandle) -> Self {
        Self { host, config }
    }

    /// Run the check; every failure is folded into the returned result
    ///
    /// Console output produced while the check runs is attached to the
    /// result either way.
    pub async fn check_compilation(&self, cancel: CancellationToken) -> CompilationResult {
        let timeouts = self.config.load().timeouts.clone();
        let collector = ConsoleLogCollector::start(self.host.subscribe_console());

        let outcome = self.run_chain(&timeouts, &cancel).await;

        if !cancel.is_cancelled() {
            tokio::time::sleep(timeouts.log_flush()).await;
        }
        let logs = collector.stop().await;

        match outcome {
            Ok(()) => {
                info!(log_entries = logs.len(), "Compilation succeeded");
                CompilationResult::success(logs)
            }
            Err(e) => {
                warn!(error = %e, log_entries = logs.len(), "Compilation check failed");
                CompilationResult::failure(e.to_string(), logs)
            }
        }
    }

    async fn run_chain(
        &self,
        timeouts: &TimeoutConfig,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestrationError> {
        let engine = self
            .host
            .monitor()
            .current()
            .handle()
            .ok_or(OrchestrationError::NotConnected)?;

        debug!("Requesting asset refresh");
        let handle = engine.clone();
        let refresh = cancellable(
            cancel,
            self.host
                .dispatcher()
                .call_on_owner(move || handle.refresh(RefreshKind::Normal)),
        )
        .await?
        .map_err(OrchestrationError::RefreshStartFailed)?;

        match bounded(cancel, timeouts.refresh(), refresh.wait()).await? {
            Some(Ok(())) => debug!("Asset refresh completed"),
            // A refresh that recompiles scripts reloads the engine, which
            // drops the call; the reconnect wait below covers it
            Some(Err(e)) => warn!(error = %e, "Asset refresh did not complete, expecting engine reload"),
            None => {
                return Err(OrchestrationError::TimedOut {
                    step: TimeoutStep::Refresh,
                    elapsed: timeouts.refresh(),
                })
            }
        }

        let budget = timeouts.post_refresh_reconnect();
        let engine = cancellable(cancel, self.host.monitor().wait_for_connection(budget))
            .await?
            .ok_or(OrchestrationError::ConnectionTimedOut {
                phase: ConnectPhase::AfterRefresh,
                waited: budget,
            })?;

        debug!("Querying compilation result");
        let handle = engine.clone();
        let query = cancellable(
            cancel,
            self.host
                .dispatcher()
                .call_on_owner(move || handle.compilation_result()),
        )
        .await?
        .map_err(OrchestrationError::CompilationQueryFailed)?;

        match bounded(cancel, timeouts.compile_query(), query.wait()).await? {
            Some(Ok(true)) => Ok(()),
            Some(Ok(false)) => Err(OrchestrationError::CompilationFailed),
            Some(Err(e)) => Err(OrchestrationError::CompilationQueryFailed(e)),
            None => Err(OrchestrationError::TimedOut {
                step: TimeoutStep::CompilationQuery,
                elapsed: timeouts.compile_query(),
            }),
        }
    }
}

/// Run `fut` unless `cancel` fires first
pub(super) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, OrchestrationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrchestrationError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Run `fut` for at most `timeout`; `None` when it ran out
pub(super) async fn bounded<F: Future>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<Option<F::Output>, OrchestrationError> {
    cancellable(cancel, tokio::time::timeout(timeout, fut))
        .await
        .map(Result::ok)
}
