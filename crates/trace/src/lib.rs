//! Run tracing for Arbor: the observable, replayable record of each run.
//!
//! Every run emits an ordered sequence of immutable [`TraceEvent`]s. Three
//! consumers share that stream:
//!
//! 1. The live transport (out of scope here) forwards events to observers
//! 2. The [`TraceStore`] keeps the last 100 runs in memory for inspection
//! 3. The [`TraceWriter`] appends each event as a JSON line to a per-run
//!    file, the durable record that survives restarts
//!
//! Events are append-only: once emitted they are never mutated.

pub mod event;
pub mod store;
pub mod writer;

pub use event::{QuestionType, RunStatus, TraceEvent, TracePayload};
pub use store::{RunSummary, TraceStore};
pub use writer::{RunFileMeta, TraceWriter};

/// Errors from the trace subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("trace storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}
