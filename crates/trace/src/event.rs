//! Trace event model: the tagged-union vocabulary of observable run events.
//!
//! One constructor ([`TraceEvent::new`]) stamps a caller-supplied payload
//! with a fresh unique identifier and the current time. No validation beyond
//! the type system: the caller guarantees required fields per variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a final text answer.
    Completed,
    /// The iteration budget ran out before a final answer.
    MaxIterations,
    /// The run failed.
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::MaxIterations => write!(f, "max_iterations"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The kind of answer a clarification question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Select,
    MultiSelect,
    Text,
    Confirm,
}

/// The per-variant payload of a trace event.
///
/// Every consumer (store, writer, transport) matches exhaustively on this
/// enum; adding a variant is a compile-visible change everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TracePayload {
    /// The run began.
    Start {
        model: String,
        max_iterations: u32,
        user_message: String,
    },

    /// A reasoning fragment surfaced by the model.
    Thinking { text: String },

    /// A tool is being invoked (explicitly, or synthesized from grounding).
    ToolCall {
        name: String,
        args: serde_json::Value,
    },

    /// A tool invocation finished.
    ToolResult {
        name: String,
        result: serde_json::Value,
        duration_ms: u64,
        is_error: bool,
    },

    /// The run is suspended awaiting a human answer.
    AskUser {
        question: String,
        question_type: QuestionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        /// Filled in locally by UI layers for display; the persisted
        /// event is written before the answer exists.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },

    /// Final (or interim) natural-language output.
    Text { text: String },

    /// Something went wrong (retry notices included).
    Error { message: String },

    /// The run reached a terminal status.
    End {
        status: RunStatus,
        duration_ms: u64,
        total_iterations: u32,
    },
}

impl TracePayload {
    /// The wire tag for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::AskUser { .. } => "ask_user",
            Self::Text { .. } => "text",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }
}

/// An immutable, timestamped, uniquely-identified record of one occurrence
/// within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Unique event identifier.
    pub event_id: String,

    /// The run this event belongs to.
    pub run_id: String,

    /// Which loop iteration produced this event.
    pub iteration: u32,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: TracePayload,
}

impl TraceEvent {
    /// Stamp a payload with a fresh identifier and the current time.
    pub fn new(run_id: impl Into<String>, iteration: u32, payload: TracePayload) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            iteration,
            timestamp: Utc::now(),
            payload,
        }
    }
}
