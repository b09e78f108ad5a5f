//! Bounded in-memory store of recent runs.
//!
//! A debugging aid, not the durable record: state is lost on restart.
//! Shared across all runs on a process; mutation is append-only and
//! bounded, guarded by a mutex so the store can be shared between tasks.

use crate::event::TraceEvent;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const DEFAULT_MAX_RUNS: usize = 100;

/// A one-line summary of a tracked run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub event_count: usize,
    pub started_at: DateTime<Utc>,
}

/// In-memory store for recent trace runs (last 100 by default).
pub struct TraceStore {
    inner: Mutex<Inner>,
    max_runs: usize,
}

struct Inner {
    runs: HashMap<String, Vec<TraceEvent>>,
    /// Run ids in insertion order, oldest first.
    order: VecDeque<String>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RUNS)
    }

    /// A store keeping at most `max_runs` distinct runs.
    pub fn with_capacity(max_runs: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                runs: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_runs,
        }
    }

    /// Associate an event with its run, creating the run entry on first
    /// sight and evicting the oldest run beyond the capacity bound.
    pub fn add(&self, event: TraceEvent) {
        let mut inner = self.inner.lock().expect("trace store poisoned");
        if !inner.runs.contains_key(&event.run_id) {
            if inner.order.len() >= self.max_runs
                && let Some(oldest) = inner.order.pop_front()
            {
                let _ = inner.runs.remove(&oldest);
            }
            let _ = inner.runs.insert(event.run_id.clone(), Vec::new());
            inner.order.push_back(event.run_id.clone());
        }
        if let Some(events) = inner.runs.get_mut(&event.run_id) {
            events.push(event);
        }
    }

    /// The full ordered event list for a run, or `None` if not tracked.
    pub fn get(&self, run_id: &str) -> Option<Vec<TraceEvent>> {
        let inner = self.inner.lock().expect("trace store poisoned");
        inner.runs.get(run_id).cloned()
    }

    /// Per-run summaries, newest-first.
    pub fn list(&self) -> Vec<RunSummary> {
        let inner = self.inner.lock().expect("trace store poisoned");
        inner
            .order
            .iter()
            .rev()
            .filter_map(|run_id| {
                let events = inner.runs.get(run_id)?;
                Some(RunSummary {
                    run_id: run_id.clone(),
                    event_count: events.len(),
                    started_at: events
                        .first()
                        .map(|e| e.timestamp)
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect()
    }

    /// Number of distinct tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.lock().expect("trace store poisoned").order.len()
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new()
    }
}
