//! Retry policy for LLM calls.
//!
//! Up to 3 attempts with exponential backoff (1s, 2s). Only transient
//! failures are retried; fatal ones (auth, bad request, malformed
//! responses) propagate immediately. Each retry is announced as an error
//! trace event before the backoff sleep, so observers see the stall as it
//! happens rather than after.

use crate::sink::EventSink;
use arbor_core::error::ProviderError;
use arbor_core::provider::{GenerateConfig, LlmClient, LlmResponse};
use arbor_core::turn::Turn;
use arbor_trace::{TraceEvent, TracePayload};
use tracing::{debug, warn};

pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry `attempt` (1-based): 1000ms, 2000ms, ...
pub fn backoff_ms(attempt: u32) -> u64 {
    1000u64 << (attempt - 1)
}

/// Call `client.generate` with the retry policy, emitting an error event
/// per retry.
pub async fn generate_with_retry(
    client: &dyn LlmClient,
    model: &str,
    history: &[Turn],
    config: &GenerateConfig,
    run_id: &str,
    iteration: u32,
    sink: &EventSink,
) -> std::result::Result<LlmResponse, ProviderError> {
    let mut attempt = 1;
    loop {
        match client.generate(model, history, config).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                let backoff = backoff_ms(attempt);
                warn!(attempt, backoff_ms = backoff, error = %e, "LLM call failed, retrying");
                sink.emit(TraceEvent::new(
                    run_id,
                    iteration,
                    TracePayload::Error {
                        message: format!(
                            "LLM call failed (attempt {attempt}/{MAX_ATTEMPTS}), retrying in {backoff}ms: {e}"
                        ),
                    },
                ));
                tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(attempt, error = %e, "LLM call failed, not retrying");
                return Err(e);
            }
        }
    }
}
