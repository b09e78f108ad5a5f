//! Built-in tools for the Arbor agent.
//!
//! Two formatting tools ([`CompareItemsTool`], [`CreateChecklistTool`]) turn
//! model-supplied arguments into structured payloads the UI can render, and
//! [`WebSearchTool`] delegates a query to a search-grounded LLM call.
//!
//! The `ask_user` clarification tool is declared here but deliberately NOT
//! registered: the orchestration loop intercepts calls to it and suspends
//! the run instead of dispatching through the registry.

pub mod checklist;
pub mod comparison;
pub mod web_search;

pub use checklist::CreateChecklistTool;
pub use comparison::CompareItemsTool;
pub use web_search::WebSearchTool;

use arbor_core::{LlmClient, ToolDefinition, ToolRegistry};
use std::sync::Arc;

/// Name of the reserved clarification tool handled by the loop itself.
pub const ASK_USER_TOOL: &str = "ask_user";

/// Declaration for the clarification tool, advertised to the model
/// alongside the registry's definitions.
pub fn ask_user_declaration() -> ToolDefinition {
    ToolDefinition {
        name: ASK_USER_TOOL.to_string(),
        description: "Ask the user a clarifying question when their request is ambiguous \
                      or missing information you need to proceed. The run pauses until \
                      the user answers."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                },
                "question_type": {
                    "type": "string",
                    "enum": ["select", "multi_select", "text", "confirm"],
                    "description": "How the user should answer"
                },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Choices for select and multi_select questions"
                },
                "placeholder": {
                    "type": "string",
                    "description": "Placeholder hint for text questions"
                }
            },
            "required": ["question"]
        }),
    }
}

/// Build the standard registry: both formatting tools plus a web search
/// tool delegating to `client` with `search_model`.
pub fn default_registry(client: Arc<dyn LlmClient>, search_model: impl Into<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CompareItemsTool));
    registry.register(Box::new(CreateChecklistTool));
    registry.register(Box::new(WebSearchTool::new(client, search_model)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{GenerateConfig, LlmResponse, ProviderError, ResponsePart, Turn};
    use async_trait::async_trait;

    struct NoopClient;

    #[async_trait]
    impl LlmClient for NoopClient {
        fn name(&self) -> &str {
            "noop"
        }
        async fn generate(
            &self,
            _model: &str,
            _history: &[Turn],
            _config: &GenerateConfig,
        ) -> std::result::Result<LlmResponse, ProviderError> {
            Ok(LlmResponse {
                model: "noop".into(),
                parts: vec![ResponsePart {
                    text: "ok".into(),
                    thought: false,
                }],
                function_calls: Vec::new(),
                grounding: None,
            })
        }
    }

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(Arc::new(NoopClient), "gemini-2.5-flash");
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["compare_items", "create_checklist", "web_search"]);
    }

    #[test]
    fn ask_user_is_not_in_the_registry() {
        let registry = default_registry(Arc::new(NoopClient), "gemini-2.5-flash");
        assert!(registry.get(ASK_USER_TOOL).is_none());
    }

    #[test]
    fn ask_user_declaration_shape() {
        let decl = ask_user_declaration();
        assert_eq!(decl.name, "ask_user");
        assert_eq!(decl.parameters["required"][0], "question");
        let types: Vec<&str> = decl.parameters["properties"]["question_type"]["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["select", "multi_select", "text", "confirm"]);
    }
}
