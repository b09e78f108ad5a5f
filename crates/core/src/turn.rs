//! Turn and History domain types.
//!
//! A conversation history is an ordered sequence of turns, each owned by one
//! of two roles. The orchestration loop owns exactly one history per run and
//! discards it when the run ends. Roles must strictly alternate; a violation
//! is an orchestration bug and is rejected before every model call, never
//! silently repaired.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The owner of a turn in conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (including synthetic nudges and tool responses).
    User,
    /// The model.
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// One content part within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text { text: String },
    /// A model-issued request to invoke a named tool.
    FunctionCall {
        name: String,
        args: serde_json::Value,
    },
    /// The result of a tool invocation, paired back to the model.
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

/// A single turn: one role, one or more content parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn containing a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// A model turn containing a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// A user turn carrying one function response per executed tool call.
    pub fn function_responses(results: Vec<(String, serde_json::Value)>) -> Self {
        Self {
            role: Role::User,
            parts: results
                .into_iter()
                .map(|(name, response)| Part::FunctionResponse { name, response })
                .collect(),
        }
    }

    /// Concatenated text content of this turn.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let Part::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }
}

/// Two consecutive turns share a role, a fatal protocol violation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("turn roles must strictly alternate: turn {index} repeats role '{role}'")]
pub struct TurnOrderError {
    /// Index of the offending turn.
    pub index: usize,
    /// The repeated role.
    pub role: Role,
}

/// The ordered, strictly-alternating conversation history one run owns.
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn. Alternation is validated separately, before each
    /// model call, so that a violation is reported at the call boundary.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Verify that no two consecutive turns share a role.
    pub fn validate_alternation(&self) -> std::result::Result<(), TurnOrderError> {
        for (i, pair) in self.turns.windows(2).enumerate() {
            if pair[0].role == pair[1].role {
                return Err(TurnOrderError {
                    index: i + 1,
                    role: pair[1].role,
                });
            }
        }
        Ok(())
    }
}
