//! Synthetic tool events for provider-side search grounding.
//!
//! When the provider grounds a response with its own web search, no tool
//! was dispatched, but observers still want to see the search in the
//! trace. This module maps grounding metadata into a synthetic
//! `web_search` tool_call/tool_result pair. Pure function, no I/O.

use arbor_core::provider::GroundingMetadata;
use arbor_trace::{TraceEvent, TracePayload};

/// Events representing a provider-side search, or empty when the
/// response was not grounded (no search queries recorded).
pub fn synthesize(
    run_id: &str,
    iteration: u32,
    grounding: Option<&GroundingMetadata>,
) -> Vec<TraceEvent> {
    let Some(grounding) = grounding else {
        return Vec::new();
    };
    if grounding.web_search_queries.is_empty() {
        return Vec::new();
    }

    let sources: Vec<serde_json::Value> = grounding
        .sources()
        .into_iter()
        .map(|s| serde_json::json!({"title": s.title, "uri": s.uri}))
        .collect();

    vec![
        TraceEvent::new(
            run_id,
            iteration,
            TracePayload::ToolCall {
                name: "web_search".into(),
                args: serde_json::json!({"queries": grounding.web_search_queries}),
            },
        ),
        TraceEvent::new(
            run_id,
            iteration,
            TracePayload::ToolResult {
                name: "web_search".into(),
                result: serde_json::json!({"sources": sources}),
                duration_ms: 0,
                is_error: false,
            },
        ),
    ]
}
