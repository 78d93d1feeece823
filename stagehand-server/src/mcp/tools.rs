//! MCP tool definitions
//!
//! Defines the tools exposed to agents through the MCP protocol.

use super::protocol::Tool;

pub const RUN_TESTS: &str = "run_tests";
pub const GET_COMPILATION_RESULT: &str = "get_compilation_result";
pub const PLAY_CONTROL: &str = "play_control";
pub const RUN_METHOD: &str = "run_method";

/// Get all tool definitions for the stagehand MCP server
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: RUN_TESTS.into(),
            description: "Run tests in the connected editor and return pass/fail/skip counts with details of failing tests. \
                Waits for the editor to connect, survives domain reloads during the run, and times out per MCP_TOOL_TIMEOUT (default 300 seconds). \
                Run get_compilation_result first after changing code."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "testMode": {
                        "type": "string",
                        "description": "EditMode or PlayMode (case insensitive; edit and play are accepted)"
                    },
                    "assemblyNames": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Test assemblies to run. At least one non-empty name is required."
                    },
                    "testNames": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Full names of tests to run"
                    },
                    "groupNames": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Regular expressions matched against test names"
                    },
                    "categoryNames": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Test categories to run"
                    }
                },
                "required": ["testMode", "assemblyNames"]
            }),
        },
        Tool {
            name: GET_COMPILATION_RESULT.into(),
            description: "Refresh assets in the editor and report whether scripts compiled. \
                Console logs captured during compilation are returned in the logs field."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: RUN_METHOD.into(),
            description: "Invoke a static, parameterless method in the editor via reflection. The method's return value is not returned. \
                success only says whether the method was found and invoked; exceptions thrown inside it show up in the logs field. \
                Times out per MCP_TOOL_TIMEOUT (default 300 seconds)."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "assemblyName": {
                        "type": "string",
                        "description": "Assembly containing the type (e.g. 'Assembly-CSharp-Editor')"
                    },
                    "typeName": {
                        "type": "string",
                        "description": "Fully qualified type name (e.g. 'MyNamespace.MyEditorTool')"
                    },
                    "methodName": {
                        "type": "string",
                        "description": "Static method to invoke (e.g. 'DoSomething')"
                    }
                },
                "required": ["assemblyName", "typeName", "methodName"]
            }),
        },
        Tool {
            name: PLAY_CONTROL.into(),
            description: "Control the editor's play mode and report the resulting state".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["play", "stop", "pause", "resume", "step", "status"],
                        "description": "Play-mode action to apply"
                    }
                },
                "required": ["action"]
            }),
        },
    ]
}
