//! stagehand-protocol: Fixed-shape records exchanged with the editor engine
//!
//! This crate defines the request/response and event records carried over
//! the engine control channel: test launches and their filters, per-test
//! result events, run completion, refresh requests, method invocations,
//! console log events and play-mode state.

pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use messages::{
    AssemblyFilter, ConsoleLogEvent, RunMethodData, RunMethodResponse, RunResult, RunTestsRequest,
    TestFilter, TestResultEvent, TestResultItem,
};
pub use types::{EngineTestStatus, LogEventKind, PlayState, RefreshKind, TestMode, TestResultStatus};

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;
