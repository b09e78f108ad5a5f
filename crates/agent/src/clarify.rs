//! Clarification broker: pairing suspended runs with user answers.
//!
//! When the model calls `ask_user`, the loop emits the question and parks
//! on [`ClarificationBroker::wait`] keyed by the question's event id. A
//! transport layer later calls [`ClarificationBroker::resolve`] with the
//! user's answer, waking the run. Unanswered questions time out (120s by
//! default) and the run continues with a timeout result instead of
//! hanging forever.

use arbor_trace::QuestionType;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A question awaiting an answer, as exposed to transports.
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub placeholder: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClarifyError {
    #[error("No answer received within {0} seconds")]
    TimedOut(u64),

    #[error("Answer channel closed before an answer arrived")]
    Closed,
}

struct Entry {
    info: PendingQuestion,
    tx: oneshot::Sender<String>,
}

/// Matches in-flight `ask_user` questions to their eventual answers.
pub struct ClarificationBroker {
    timeout: Duration,
    pending: Mutex<HashMap<String, Entry>>,
}

impl ClarificationBroker {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Park until `resolve` is called with this `event_id`, or the
    /// timeout elapses.
    pub async fn wait(
        &self,
        event_id: &str,
        info: PendingQuestion,
    ) -> std::result::Result<String, ClarifyError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("broker poisoned");
            let _ = pending.insert(event_id.to_string(), Entry { info, tx });
        }
        debug!(event_id, "Awaiting clarification answer");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => {
                self.remove(event_id);
                Err(ClarifyError::Closed)
            }
            Err(_) => {
                warn!(event_id, "Clarification timed out");
                self.remove(event_id);
                Err(ClarifyError::TimedOut(self.timeout.as_secs()))
            }
        }
    }

    /// Deliver an answer. Returns false when no question with this id is
    /// waiting (already answered, timed out, or never asked).
    pub fn resolve(&self, event_id: &str, answer: impl Into<String>) -> bool {
        let entry = {
            let mut pending = self.pending.lock().expect("broker poisoned");
            pending.remove(event_id)
        };
        match entry {
            Some(entry) => entry.tx.send(answer.into()).is_ok(),
            None => false,
        }
    }

    /// Questions currently awaiting answers, with their event ids.
    pub fn pending(&self) -> Vec<(String, PendingQuestion)> {
        let pending = self.pending.lock().expect("broker poisoned");
        pending
            .iter()
            .map(|(id, entry)| (id.clone(), entry.info.clone()))
            .collect()
    }

    fn remove(&self, event_id: &str) {
        let mut pending = self.pending.lock().expect("broker poisoned");
        let _ = pending.remove(event_id);
    }
}

impl Default for ClarificationBroker {
    fn default() -> Self {
        Self::new()
    }
}
