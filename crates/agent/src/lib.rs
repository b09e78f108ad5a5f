//! The Arbor orchestration loop.
//!
//! Drives iterative LLM reasoning: each cycle sends the accumulated turn
//! history to the model, relays any surfaced thoughts, dispatches requested
//! tools, feeds results back, and repeats until the model answers in plain
//! text or the iteration budget runs out. Every observable step is emitted
//! as a trace event through an [`EventSink`].
//!
//! Clarifications are first-class: the model can call the reserved
//! `ask_user` tool, which suspends the run on a [`ClarificationBroker`]
//! until the user answers or a timeout elapses.

pub mod clarify;
pub mod config;
pub mod grounding;
pub mod protocol;
pub mod retry;
pub mod runner;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use clarify::{ClarificationBroker, PendingQuestion};
pub use config::OrchestratorConfig;
pub use runner::{Orchestrator, RunOutcome};
pub use sink::EventSink;

use arbor_core::error::ProviderError;
use arbor_core::turn::TurnOrderError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    TurnOrder(#[from] TurnOrderError),

    #[error("I'm sorry, I was unable to produce a response. Please try rephrasing your request.")]
    EmptyResponse,

    #[error("Run was cancelled")]
    Cancelled,
}
