//! LlmClient trait: the abstraction over LLM backends.
//!
//! A client knows how to send a conversation history to an LLM and return a
//! structured response: text parts (possibly flagged as reasoning), tool
//! invocations, and grounding metadata from provider-side web search.
//!
//! Implementations: Gemini `generateContent` (arbor-providers), mocks in
//! tests.

use crate::error::ProviderError;
use crate::turn::{Part, Role, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-call configuration for a generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateConfig {
    /// System instruction, sent outside the turn history.
    pub system_instruction: Option<String>,

    /// Tool declarations the model may invoke.
    pub tools: Vec<ToolDefinition>,

    /// Enable provider-side web search grounding.
    pub search_grounding: bool,

    /// Ask the provider to surface reasoning parts.
    pub include_thoughts: bool,
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One content part of a model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePart {
    pub text: String,
    /// Whether this part is a reasoning fragment rather than answer text.
    #[serde(default)]
    pub thought: bool,
}

/// A model-issued tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// A web source referenced by grounding metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSource {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// One grounding chunk; only web sources are carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

/// Metadata attached when the provider performed its own web search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingMetadata {
    pub web_search_queries: Vec<String>,
    pub chunks: Vec<GroundingChunk>,
}

/// A normalized source reference: both fields fall back to "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl GroundingMetadata {
    /// Normalize grounding chunks into title/uri pairs.
    pub fn sources(&self) -> Vec<Source> {
        self.chunks
            .iter()
            .map(|chunk| {
                let web = chunk.web.as_ref();
                Source {
                    title: web
                        .and_then(|w| w.title.clone())
                        .unwrap_or_else(|| "unknown".into()),
                    uri: web
                        .and_then(|w| w.uri.clone())
                        .unwrap_or_else(|| "unknown".into()),
                }
            })
            .collect()
    }
}

/// A complete response from an LLM backend.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Which model actually responded.
    pub model: String,

    /// Content parts in candidate order.
    pub parts: Vec<ResponsePart>,

    /// Structured tool invocations, if any.
    pub function_calls: Vec<FunctionCall>,

    /// Grounding metadata, present when the provider searched on its own.
    pub grounding: Option<GroundingMetadata>,
}

impl LlmResponse {
    /// Concatenated non-reasoning text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if !part.thought {
                out.push_str(&part.text);
            }
        }
        out
    }

    /// Reasoning fragments, in order.
    pub fn thoughts(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| p.thought && !p.text.is_empty())
            .map(|p| p.text.as_str())
            .collect()
    }

    /// Reconstruct the model's turn for appending to history.
    ///
    /// Some providers omit structured content when only tool calls are
    /// present; in that case the turn is rebuilt from the invocations so
    /// alternation is preserved.
    pub fn model_turn(&self) -> Turn {
        let mut parts: Vec<Part> = self
            .parts
            .iter()
            .filter(|p| !p.thought && !p.text.is_empty())
            .map(|p| Part::Text {
                text: p.text.clone(),
            })
            .collect();

        for call in &self.function_calls {
            parts.push(Part::FunctionCall {
                name: call.name.clone(),
                args: call.args.clone(),
            });
        }

        if parts.is_empty() {
            parts.push(Part::Text {
                text: String::new(),
            });
        }

        Turn {
            role: Role::Model,
            parts,
        }
    }
}

/// The core LlmClient trait.
///
/// Every LLM backend implements this trait. The orchestration loop calls
/// `generate()` without knowing which backend is in use.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a full history plus config and get a complete response.
    async fn generate(
        &self,
        model: &str,
        history: &[Turn],
        config: &GenerateConfig,
    ) -> std::result::Result<LlmResponse, ProviderError>;
}
