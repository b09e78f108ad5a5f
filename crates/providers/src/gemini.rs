//! Gemini `generateContent` provider implementation.
//!
//! Features:
//! - API key authentication via the `x-goog-api-key` header
//! - Function calling with declared tools
//! - Provider-side web search grounding (`googleSearch` tool)
//! - Thought surfacing via `thinkingConfig.includeThoughts`
//!
//! The wire format is camelCase JSON; conversion from the domain's turn
//! model happens at this boundary and nowhere else.

use arbor_core::error::{NetworkFault, ProviderError};
use arbor_core::provider::*;
use arbor_core::turn::{Part, Role, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Gemini `generateContent` client.
pub struct GeminiClient {
    name: String,
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            http,
        }
    }

    /// Custom base URL, for proxies and tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert the domain history into Gemini `contents`.
    fn to_api_contents(history: &[Turn]) -> Vec<ApiContent> {
        history
            .iter()
            .map(|turn| ApiContent {
                role: match turn.role {
                    Role::User => "user".into(),
                    Role::Model => "model".into(),
                },
                parts: turn.parts.iter().map(Self::to_api_part).collect(),
            })
            .collect()
    }

    fn to_api_part(part: &Part) -> ApiPart {
        match part {
            Part::Text { text } => ApiPart {
                text: Some(text.clone()),
                ..Default::default()
            },
            Part::FunctionCall { name, args } => ApiPart {
                function_call: Some(ApiFunctionCall {
                    name: name.clone(),
                    args: args.clone(),
                }),
                ..Default::default()
            },
            Part::FunctionResponse { name, response } => ApiPart {
                function_response: Some(ApiFunctionResponse {
                    name: name.clone(),
                    response: response.clone(),
                }),
                ..Default::default()
            },
        }
    }

    fn build_request(history: &[Turn], config: &GenerateConfig) -> ApiRequest {
        let mut tools = Vec::new();
        if !config.tools.is_empty() {
            tools.push(ApiTool {
                function_declarations: Some(
                    config
                        .tools
                        .iter()
                        .map(|t| ApiFunctionDeclaration {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        })
                        .collect(),
                ),
                google_search: None,
            });
        }
        if config.search_grounding {
            tools.push(ApiTool {
                function_declarations: None,
                google_search: Some(serde_json::json!({})),
            });
        }

        ApiRequest {
            contents: Self::to_api_contents(history),
            system_instruction: config.system_instruction.as_ref().map(|text| ApiContent {
                role: "user".into(),
                parts: vec![ApiPart {
                    text: Some(text.clone()),
                    ..Default::default()
                }],
            }),
            tools,
            generation_config: config.include_thoughts.then(|| ApiGenerationConfig {
                thinking_config: Some(ApiThinkingConfig {
                    include_thoughts: true,
                }),
            }),
        }
    }

    fn parse_response(
        model: &str,
        api: ApiResponse,
    ) -> std::result::Result<LlmResponse, ProviderError> {
        let candidate = api
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no candidates returned".into()))?;

        let mut parts = Vec::new();
        let mut function_calls = Vec::new();
        if let Some(content) = candidate.content {
            for part in content.parts {
                if let Some(call) = part.function_call {
                    function_calls.push(FunctionCall {
                        name: call.name,
                        args: call.args,
                    });
                } else if let Some(text) = part.text {
                    parts.push(ResponsePart {
                        text,
                        thought: part.thought,
                    });
                }
            }
        }

        let grounding = candidate.grounding_metadata.map(|g| GroundingMetadata {
            web_search_queries: g.web_search_queries,
            chunks: g
                .grounding_chunks
                .into_iter()
                .map(|chunk| GroundingChunk {
                    web: chunk.web.map(|w| WebSource {
                        title: w.title,
                        uri: w.uri,
                    }),
                })
                .collect(),
        });

        Ok(LlmResponse {
            model: model.to_string(),
            parts,
            function_calls,
            grounding,
        })
    }

    fn classify_transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            return ProviderError::Timeout(e.to_string());
        }
        let kind = Self::chain_fault(&e).unwrap_or(if e.is_connect() {
            NetworkFault::ConnectTimeout
        } else {
            NetworkFault::Other
        });
        ProviderError::Network {
            kind,
            message: e.to_string(),
        }
    }

    /// Walk an error's source chain looking for connection resets and
    /// name-resolution failures. Resets surface as `std::io::Error` kinds
    /// somewhere below the reqwest/hyper wrappers; DNS failures carry no
    /// dedicated kind, only a recognizable message.
    fn chain_fault(e: &(dyn std::error::Error + 'static)) -> Option<NetworkFault> {
        let mut source = e.source();
        while let Some(err) = source {
            if let Some(io) = err.downcast_ref::<std::io::Error>()
                && matches!(
                    io.kind(),
                    std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::BrokenPipe
                )
            {
                return Some(NetworkFault::ConnectionReset);
            }
            let message = err.to_string().to_lowercase();
            if message.contains("dns") || message.contains("failed to lookup address") {
                return Some(NetworkFault::Dns);
            }
            source = err.source();
        }
        None
    }

    fn classify_status(status: u16, body: String) -> ProviderError {
        match status {
            401 | 403 => ProviderError::AuthenticationFailed(body),
            _ => ProviderError::Api {
                status,
                message: body,
            },
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        model: &str,
        history: &[Turn],
        config: &GenerateConfig,
    ) -> std::result::Result<LlmResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("missing Gemini API key".into()));
        }

        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let body = Self::build_request(history, config);

        debug!(provider = "gemini", model, turns = history.len(), "Sending generation request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(Self::classify_status(status, error_body));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Self::parse_response(model, api)
    }
}

// --- Gemini wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    role: String,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<ApiFunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ApiThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiThinkingConfig {
    include_thoughts: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    content: Option<ApiContent>,
    grounding_metadata: Option<ApiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGroundingMetadata {
    #[serde(default)]
    web_search_queries: Vec<String>,
    #[serde(default)]
    grounding_chunks: Vec<ApiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct ApiGroundingChunk {
    web: Option<ApiWebSource>,
}

#[derive(Debug, Deserialize)]
struct ApiWebSource {
    title: Option<String>,
    uri: Option<String>,
}
