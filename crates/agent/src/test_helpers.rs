//! Shared mocks for loop and retry tests.

use arbor_core::error::ProviderError;
use arbor_core::provider::{
    FunctionCall, GenerateConfig, GroundingChunk, GroundingMetadata, LlmClient, LlmResponse,
    ResponsePart, WebSource,
};
use arbor_core::turn::Turn;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays a scripted sequence of responses, one per `generate` call,
/// recording the history snapshot of each call.
pub struct SequentialMockClient {
    script: Mutex<VecDeque<std::result::Result<LlmResponse, ProviderError>>>,
    histories: Mutex<Vec<Vec<Turn>>>,
}

impl SequentialMockClient {
    pub fn new(script: Vec<std::result::Result<LlmResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            histories: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.histories.lock().unwrap().len()
    }

    /// History snapshot of the `n`th call (0-based).
    pub fn history_of_call(&self, n: usize) -> Vec<Turn> {
        self.histories.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl LlmClient for SequentialMockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _model: &str,
        history: &[Turn],
        _config: &GenerateConfig,
    ) -> std::result::Result<LlmResponse, ProviderError> {
        self.histories.lock().unwrap().push(history.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("mock script exhausted"))
    }
}

pub fn make_text_response(text: &str) -> LlmResponse {
    LlmResponse {
        model: "mock".into(),
        parts: vec![ResponsePart {
            text: text.into(),
            thought: false,
        }],
        function_calls: Vec::new(),
        grounding: None,
    }
}

pub fn make_thinking_response(thought: &str, text: &str) -> LlmResponse {
    LlmResponse {
        model: "mock".into(),
        parts: vec![
            ResponsePart {
                text: thought.into(),
                thought: true,
            },
            ResponsePart {
                text: text.into(),
                thought: false,
            },
        ],
        function_calls: Vec::new(),
        grounding: None,
    }
}

pub fn make_call_response(name: &str, args: serde_json::Value) -> LlmResponse {
    LlmResponse {
        model: "mock".into(),
        parts: Vec::new(),
        function_calls: vec![FunctionCall {
            name: name.into(),
            args,
        }],
        grounding: None,
    }
}

pub fn make_grounded_response(text: &str, query: &str, source_title: &str) -> LlmResponse {
    LlmResponse {
        model: "mock".into(),
        parts: vec![ResponsePart {
            text: text.into(),
            thought: false,
        }],
        function_calls: Vec::new(),
        grounding: Some(GroundingMetadata {
            web_search_queries: vec![query.into()],
            chunks: vec![GroundingChunk {
                web: Some(WebSource {
                    title: Some(source_title.into()),
                    uri: Some("https://example.org".into()),
                }),
            }],
        }),
    }
}

pub fn make_empty_response() -> LlmResponse {
    LlmResponse {
        model: "mock".into(),
        parts: Vec::new(),
        function_calls: Vec::new(),
        grounding: None,
    }
}
