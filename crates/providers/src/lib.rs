//! LLM provider implementations for Arbor.
//!
//! Currently one backend: Google's Gemini `generateContent` API. The
//! orchestration loop only sees the [`arbor_core::LlmClient`] trait, so
//! additional backends slot in without touching the loop.

pub mod gemini;

pub use gemini::GeminiClient;
