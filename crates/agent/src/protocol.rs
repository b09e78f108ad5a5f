//! Transport boundary types.
//!
//! Serde-serializable messages exchanged with whatever front end drives
//! the agent (CLI, websocket, test harness). The loop itself never sees
//! these; transports translate them to and from runner calls and broker
//! resolutions.

use arbor_trace::QuestionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound user request starting a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An inbound answer to a pending clarification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationAnswer {
    pub event_id: String,
    pub answer: String,
}

/// The final reply for a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub run_id: String,
    pub text: String,
    /// Structured payloads collected from successful formatting tools.
    pub structured_results: Vec<serde_json::Value>,
}

/// Reported when a run aborts with an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub run_id: String,
    pub message: String,
}

/// An outbound clarification request for the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub event_id: String,
    pub run_id: String,
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}
