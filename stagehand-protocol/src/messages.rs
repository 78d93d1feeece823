//! Launch requests, per-test events and log records

use serde::{Deserialize, Serialize};

use crate::types::{EngineTestStatus, LogEventKind, TestMode, TestResultStatus};

// ==================== Test Launch Types ====================

/// Selection of tests for a run
///
/// `group_names` entries may be regular expressions; matching is done by the
/// engine's test runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFilter {
    pub assembly_names: Vec<String>,
    #[serde(default)]
    pub test_names: Vec<String>,
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default)]
    pub category_names: Vec<String>,
}

impl TestFilter {
    /// Create a filter for the given assemblies with no further narrowing
    pub fn for_assemblies<I, S>(assemblies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            assembly_names: assemblies.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Assembly names with blank entries removed
    pub fn effective_assembly_names(&self) -> Vec<String> {
        self.assembly_names
            .iter()
            .filter(|name| !name.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Whether at least one assembly name is non-blank
    pub fn has_valid_assembly_names(&self) -> bool {
        self.assembly_names.iter().any(|name| !name.trim().is_empty())
    }

    /// Expand into one engine filter per non-blank assembly
    pub fn to_assembly_filters(&self) -> Vec<AssemblyFilter> {
        self.effective_assembly_names()
            .into_iter()
            .map(|assembly_name| AssemblyFilter {
                assembly_name,
                test_names: self.test_names.clone(),
                group_names: self.group_names.clone(),
                category_names: self.category_names.clone(),
            })
            .collect()
    }
}

/// Engine-side filter scoped to a single assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyFilter {
    pub assembly_name: String,
    pub test_names: Vec<String>,
    pub group_names: Vec<String>,
    pub category_names: Vec<String>,
}

/// A request to run tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestsRequest {
    pub mode: TestMode,
    pub filter: TestFilter,
}

impl RunTestsRequest {
    pub fn new(mode: TestMode, filter: TestFilter) -> Self {
        Self { mode, filter }
    }
}

// ==================== Test Result Types ====================

/// Result event streamed by the engine for a single test or test container
///
/// An empty `parent_id` marks a root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultEvent {
    pub test_id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub output: String,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: u32,
    pub status: EngineTestStatus,
}

impl TestResultEvent {
    pub fn new(test_id: impl Into<String>, status: EngineTestStatus) -> Self {
        Self {
            test_id: test_id.into(),
            parent_id: String::new(),
            output: String::new(),
            duration: 0,
            status,
        }
    }

    /// Set the parent container id
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    /// Set the captured output
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Set the duration in milliseconds
    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }
}

/// A terminal test result retained after collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultItem {
    pub test_id: String,
    pub parent_id: String,
    pub output: String,
    pub duration: u32,
    pub status: TestResultStatus,
}

/// Completion signal for a whole launch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub passed: bool,
}

// ==================== Console Log Types ====================

/// A console log line emitted by the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLogEvent {
    pub kind: LogEventKind,
    pub message: String,
    #[serde(default)]
    pub stack_trace: String,
}

impl ConsoleLogEvent {
    pub fn new(kind: LogEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack_trace: String::new(),
        }
    }
}

// ==================== Method Invocation Types ====================

/// A static, parameterless method for the editor to invoke by reflection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMethodData {
    pub assembly_name: String,
    pub type_name: String,
    pub method_name: String,
}

impl RunMethodData {
    pub fn new(
        assembly_name: impl Into<String>,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            assembly_name: assembly_name.into(),
            type_name: type_name.into(),
            method_name: method_name.into(),
        }
    }
}

/// The editor's answer to a method invocation
///
/// `success` only says the method was found and invoked; an exception thrown
/// inside it is reported through the console log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMethodResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stack_trace: String,
}

impl RunMethodResponse {
    pub fn invoked() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_assembly_names_drops_blanks() {
        let filter = TestFilter::for_assemblies(["", "MyTests.EditMode", "  ", "MyTests.PlayMode"]);
        assert_eq!(
            filter.effective_assembly_names(),
            vec!["MyTests.EditMode".to_string(), "MyTests.PlayMode".to_string()]
        );
    }

    #[test]
    fn test_has_valid_assembly_names() {
        assert!(!TestFilter::default().has_valid_assembly_names());
        assert!(!TestFilter::for_assemblies(["", "   ", "\t"]).has_valid_assembly_names());
        assert!(TestFilter::for_assemblies(["", "Game.Tests"]).has_valid_assembly_names());
    }

    #[test]
    fn test_assembly_filters_share_narrowing_lists() {
        let filter = TestFilter {
            assembly_names: vec!["A".into(), " ".into(), "B".into()],
            test_names: vec!["A.Foo".into()],
            group_names: vec!["^My\\.".into()],
            category_names: vec!["Fast".into()],
        };

        let filters = filter.to_assembly_filters();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].assembly_name, "A");
        assert_eq!(filters[1].assembly_name, "B");
        for f in &filters {
            assert_eq!(f.test_names, vec!["A.Foo".to_string()]);
            assert_eq!(f.group_names, vec!["^My\\.".to_string()]);
            assert_eq!(f.category_names, vec!["Fast".to_string()]);
        }
    }

    #[test]
    fn test_filter_deserializes_with_missing_optional_lists() {
        let filter: TestFilter =
            serde_json::from_str(r#"{"assemblyNames":["Game.Tests"]}"#).unwrap();
        assert_eq!(filter.assembly_names, vec!["Game.Tests".to_string()]);
        assert!(filter.test_names.is_empty());
        assert!(filter.group_names.is_empty());
        assert!(filter.category_names.is_empty());
    }

    #[test]
    fn test_result_event_builder() {
        let event = TestResultEvent::new("Suite.Case(1)", EngineTestStatus::Failure)
            .with_parent("Suite.Case")
            .with_output("expected 1")
            .with_duration(12);
        assert_eq!(event.parent_id, "Suite.Case");
        assert_eq!(event.output, "expected 1");
        assert_eq!(event.duration, 12);
    }

    #[test]
    fn test_run_method_response_wire_names() {
        let response: RunMethodResponse = serde_json::from_str(
            r#"{"success":false,"message":"Type not found","stackTrace":"at Foo.Bar()"}"#,
        )
        .unwrap();
        assert_eq!(response, RunMethodResponse::failed("Type not found", "at Foo.Bar()"));

        let response: RunMethodResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(response, RunMethodResponse::invoked());
    }
}
