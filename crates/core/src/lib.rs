//! # Arbor Core
//!
//! Domain types, traits, and error definitions for the Arbor agent
//! orchestrator. This crate has **zero framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping LLM backends via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod provider;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, NetworkFault, ProviderError, Result, ToolError};
pub use provider::{
    FunctionCall, GenerateConfig, GroundingChunk, GroundingMetadata, LlmClient, LlmResponse,
    ResponsePart, Source, ToolDefinition, WebSource,
};
pub use tool::{Tool, ToolRegistry, ToolResult};
pub use turn::{History, Part, Role, Turn, TurnOrderError};
