//! stagehand-server: Orchestration of test runs and compilation checks
//!
//! Turns the editor engine's fire-and-forget, event-streamed control channel
//! into awaitable calls with deterministic timeout, cancellation and result
//! aggregation, surviving engine restarts (domain reloads) mid-operation.
//!
//! Layering, leaves first:
//! - [`connection`]: engine handle availability and wait-for-connect
//! - [`dispatcher`]: single-owner mailbox for channel mutations
//! - [`aggregator`]: deduplicating collection of streamed per-test events
//! - [`orchestration`]: test-run, compilation-check, method-invocation and
//!   play-control flows
//! - [`mcp`]: JSON-RPC tool surface over the orchestrators

pub mod aggregator;
pub mod config;
pub mod connection;
pub mod console_log;
pub mod dispatcher;
pub mod engine;
pub mod mcp;
pub mod orchestration;
pub mod response;

#[cfg(test)]
mod testing;

pub use aggregator::{Completion, ResultAggregator};
pub use config::{new_config_handle, BridgeConfig, ConfigHandle, ConfigLoader, TimeoutConfig};
pub use connection::{ConnectionMonitor, ConnectionState, DisconnectReason};
pub use dispatcher::Dispatcher;
pub use engine::{
    CallResolver, EngineError, EngineHandle, EngineHost, EngineModel, LaunchSink, PendingCall,
    UnitTestLaunch,
};
pub use mcp::McpBridge;
pub use orchestration::{
    CompilationCheckOrchestrator, OrchestrationError, PlayAction, PlayControl,
    RunMethodOrchestrator, TestRunOrchestrator,
};
pub use response::{CompilationResult, RunMethodResult, TestDetail, TestRunSummary};
