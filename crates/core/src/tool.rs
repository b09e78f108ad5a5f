//! Tool trait: the abstraction over model-callable operations.
//!
//! Tools are what the model invokes to act: format structured content,
//! delegate a web search, ask the user a question. Most tools are pure
//! transformations of their arguments; a known tool with malformed
//! arguments reports the problem in its result payload rather than
//! failing the call.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// The outcome of a tool execution: a result payload plus an error flag.
///
/// `is_error` results are still delivered to the model so it can adapt;
/// they never abort the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The result payload (or `{"error": ...}` when flagged).
    pub result: serde_json::Value,

    /// Whether this result describes a failure.
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            result,
            is_error: false,
        }
    }

    /// An error-flagged result with a message payload.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the
/// [`ToolRegistry`], which the orchestration loop dispatches through.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "compare_items").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// Malformed-but-recognized calls return `Ok` with an error-flagged
    /// result; `Err` is reserved for unexpected execution failures
    /// (e.g., a delegated network call).
    async fn execute(&self, args: &serde_json::Value)
    -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a declaration for sending to the LLM.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The orchestration loop uses this to:
/// 1. Get tool declarations to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        let _ = self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool declarations (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Execute a tool call by name.
    ///
    /// Never fails the caller: unknown names and execution failures are
    /// converted to error-flagged results, so one failing tool never
    /// aborts a run.
    pub async fn execute(&self, name: &str, args: &serde_json::Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                ToolResult::error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            args: &serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            let text = args["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::ok(serde_json::json!({ "text": text })))
        }
    }

    /// A tool whose execution always fails with an Err.
    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _args: &serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "wires crossed".into(),
            })
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let result = registry
            .execute("echo", &serde_json::json!({"text": "hello world"}))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.result["text"], "hello world");
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_payload() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent", &serde_json::json!({})).await;
        assert!(result.is_error);
        assert_eq!(result.result["error"], "Unknown tool: nonexistent");
    }

    #[tokio::test]
    async fn failing_tool_converted_to_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(BrokenTool));

        let result = registry.execute("broken", &serde_json::json!({})).await;
        assert!(result.is_error);
        assert!(
            result.result["error"]
                .as_str()
                .unwrap()
                .contains("wires crossed")
        );
    }
}
