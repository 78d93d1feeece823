//! Response shaping
//!
//! Turns aggregated results and orchestration outcomes into the records
//! returned to the tool surface.

use std::collections::HashSet;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::json;

use stagehand_protocol::{TestResultItem, TestResultStatus};

use crate::console_log::CollectedLogEntry;

/// Results that are not a parent of any other result
///
/// Parameterized tests and fixtures report a container result whose id is the
/// parent id of their children; those containers are excluded. A blank parent
/// id never excludes anything.
pub fn leaf_results(results: &[TestResultItem]) -> Vec<&TestResultItem> {
    let parents: HashSet<&str> = results
        .iter()
        .map(|item| item.parent_id.as_str())
        .filter(|parent| !parent.trim().is_empty())
        .collect();

    results
        .iter()
        .filter(|item| !parents.contains(item.test_id.as_str()))
        .collect()
}

/// A non-passing leaf test
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetail {
    pub test_id: String,
    pub output: String,
    pub duration: u32,
}

impl From<&TestResultItem> for TestDetail {
    fn from(item: &TestResultItem) -> Self {
        Self {
            test_id: item.test_id.clone(),
            output: item.output.clone(),
            duration: item.duration,
        }
    }
}

/// Count summary of a finished test run, computed over leaf results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRunSummary {
    pub pass_count: usize,
    pub skip_count: usize,
    pub fail_count: usize,
    pub inconclusive_count: usize,
    pub failed_tests: Vec<TestDetail>,
    pub inconclusive_tests: Vec<TestDetail>,
}

impl TestRunSummary {
    pub fn from_results(results: &[TestResultItem]) -> Self {
        let mut summary = Self::default();
        for item in leaf_results(results) {
            match item.status {
                TestResultStatus::Success => summary.pass_count += 1,
                TestResultStatus::Ignored => summary.skip_count += 1,
                TestResultStatus::Failure => {
                    summary.fail_count += 1;
                    summary.failed_tests.push(item.into());
                }
                TestResultStatus::Inconclusive => {
                    summary.inconclusive_count += 1;
                    summary.inconclusive_tests.push(item.into());
                }
            }
        }
        summary
    }

    /// A run succeeds when something passed and nothing failed or was inconclusive
    pub fn success(&self) -> bool {
        self.fail_count == 0 && self.inconclusive_count == 0 && self.pass_count > 0
    }

    pub fn total(&self) -> usize {
        self.pass_count + self.skip_count + self.fail_count + self.inconclusive_count
    }
}

impl Serialize for TestRunSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TestRunSummary", 7)?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("passCount", &self.pass_count)?;
        state.serialize_field("skipCount", &self.skip_count)?;
        state.serialize_field("failCount", &self.fail_count)?;
        state.serialize_field("inconclusiveCount", &self.inconclusive_count)?;
        state.serialize_field("failedTests", &self.failed_tests)?;
        state.serialize_field("inconclusiveTests", &self.inconclusive_tests)?;
        state.end()
    }
}

/// Outcome of a compilation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub logs: Vec<CollectedLogEntry>,
}

impl CompilationResult {
    pub fn success(logs: Vec<CollectedLogEntry>) -> Self {
        Self {
            success: true,
            error_message: None,
            logs,
        }
    }

    pub fn failure(message: impl Into<String>, logs: Vec<CollectedLogEntry>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            logs,
        }
    }
}

impl Serialize for CompilationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.error_message.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("CompilationResult", len)?;
        state.serialize_field("success", &self.success)?;
        if let Some(message) = &self.error_message {
            state.serialize_field("errorMessage", message)?;
        }
        state.serialize_field("logs", &self.logs)?;
        state.end()
    }
}

/// Outcome of a method invocation; same record as a compilation check
pub type RunMethodResult = CompilationResult;

/// Outcome of a play-mode control action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayControlOutcome {
    pub action: &'static str,
    pub is_playing: bool,
    pub is_paused: bool,
}

impl Serialize for PlayControlOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PlayControlOutcome", 4)?;
        state.serialize_field("success", &true)?;
        state.serialize_field("action", self.action)?;
        state.serialize_field("isPlaying", &self.is_playing)?;
        state.serialize_field("isPaused", &self.is_paused)?;
        state.end()
    }
}

/// Error payload returned to the tool surface
pub fn error_json(message: &str) -> serde_json::Value {
    json!({ "success": false, "message": message })
}
