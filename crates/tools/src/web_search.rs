//! Web search tool backed by a search-grounded LLM call.
//!
//! The tool issues a fresh, tool-free generation with search grounding
//! enabled and returns the model's synthesized answer together with the
//! sources the grounding metadata cites. Provider failures surface as
//! `Err`, which the registry converts to an error-flagged result.

use arbor_core::error::ToolError;
use arbor_core::tool::{Tool, ToolResult};
use arbor_core::{GenerateConfig, LlmClient, Role, Turn};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct WebSearchTool {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl WebSearchTool {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information and return a synthesized \
         answer with cited sources. Use for facts that may have changed \
         since training."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        args: &serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let query = args["query"].as_str().unwrap_or("").trim();
        if query.is_empty() {
            return Ok(ToolResult::error(
                "Missing required field: query".to_string(),
            ));
        }

        debug!(query, model = %self.model, "Delegating web search");

        let history = vec![Turn {
            role: Role::User,
            parts: vec![arbor_core::Part::Text {
                text: query.to_string(),
            }],
        }];
        let config = GenerateConfig {
            search_grounding: true,
            ..Default::default()
        };

        let response = self
            .client
            .generate(&self.model, &history, &config)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: e.to_string(),
            })?;

        let sources: Vec<serde_json::Value> = response
            .grounding
            .as_ref()
            .map(|g| {
                g.sources()
                    .into_iter()
                    .map(|s| serde_json::json!({"title": s.title, "uri": s.uri}))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ToolResult::ok(serde_json::json!({
            "answer": response.text(),
            "sources": sources,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{
        GroundingChunk, GroundingMetadata, LlmResponse, ProviderError, ResponsePart, WebSource,
    };
    use std::sync::Mutex;

    struct RecordingClient {
        response: Mutex<Option<std::result::Result<LlmResponse, ProviderError>>>,
        last_config: Mutex<Option<GenerateConfig>>,
    }

    impl RecordingClient {
        fn returning(response: std::result::Result<LlmResponse, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                last_config: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        fn name(&self) -> &str {
            "recording"
        }
        async fn generate(
            &self,
            _model: &str,
            _history: &[Turn],
            config: &GenerateConfig,
        ) -> std::result::Result<LlmResponse, ProviderError> {
            *self.last_config.lock().unwrap() = Some(config.clone());
            self.response.lock().unwrap().take().unwrap()
        }
    }

    fn grounded_response(answer: &str) -> LlmResponse {
        LlmResponse {
            model: "gemini-2.5-flash".into(),
            parts: vec![ResponsePart {
                text: answer.into(),
                thought: false,
            }],
            function_calls: Vec::new(),
            grounding: Some(GroundingMetadata {
                web_search_queries: vec!["fastest train".into()],
                chunks: vec![GroundingChunk {
                    web: Some(WebSource {
                        title: Some("Rail Journal".into()),
                        uri: Some("https://example.org/rail".into()),
                    }),
                }],
            }),
        }
    }

    #[tokio::test]
    async fn search_returns_answer_with_sources() {
        let client = RecordingClient::returning(Ok(grounded_response("The Shinkansen.")));
        let tool = WebSearchTool::new(client.clone(), "gemini-2.5-flash");

        let result = tool
            .execute(&serde_json::json!({"query": "fastest train in japan"}))
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.result["answer"], "The Shinkansen.");
        assert_eq!(result.result["sources"][0]["title"], "Rail Journal");

        let config = client.last_config.lock().unwrap().clone().unwrap();
        assert!(config.search_grounding);
        assert!(config.tools.is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_an_error_result() {
        let client = RecordingClient::returning(Ok(grounded_response("unused")));
        let tool = WebSearchTool::new(client, "gemini-2.5-flash");

        let result = tool
            .execute(&serde_json::json!({"query": "   "}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.result["error"], "Missing required field: query");
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_err() {
        let client = RecordingClient::returning(Err(ProviderError::Api {
            status: 500,
            message: "boom".into(),
        }));
        let tool = WebSearchTool::new(client, "gemini-2.5-flash");

        let err = tool
            .execute(&serde_json::json!({"query": "anything"}))
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { tool_name, .. } => assert_eq!(tool_name, "web_search"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ungrounded_response_has_empty_sources() {
        let mut response = grounded_response("Plain answer.");
        response.grounding = None;
        let client = RecordingClient::returning(Ok(response));
        let tool = WebSearchTool::new(client, "gemini-2.5-flash");

        let result = tool
            .execute(&serde_json::json!({"query": "anything"}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.result["sources"].as_array().unwrap().len(), 0);
    }
}
