//! Event emission and fan-out.
//!
//! The loop emits every trace event into one [`EventSink`]; a fan-out task
//! forwards each event to the in-memory store, the durable writer, and any
//! live observer. Cancelling the sink's token silences emission, so a
//! cancelled run stops producing events immediately even while a slow tool
//! call is still unwinding.

use arbor_trace::{TraceEvent, TraceStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Where the loop sends its trace events.
#[derive(Clone)]
pub struct EventSink {
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<TraceEvent>,
}

impl EventSink {
    /// A sink plus the receiving end for a fan-out task.
    pub fn new(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<TraceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { cancel, tx }, rx)
    }

    /// Emit one event. A no-op once the run is cancelled or the receiver
    /// is gone.
    pub fn emit(&self, event: TraceEvent) {
        if self.cancel.is_cancelled() {
            trace!(run_id = %event.run_id, kind = event.payload.kind(), "Dropping event after cancel");
            return;
        }
        let _ = self.tx.send(event);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Forward events from `rx` to each configured consumer until the channel
/// closes. Consumers are independent; a missing one is simply skipped.
pub fn spawn_fanout(
    mut rx: mpsc::UnboundedReceiver<TraceEvent>,
    store: Option<Arc<TraceStore>>,
    writer: Option<mpsc::UnboundedSender<TraceEvent>>,
    live: Option<mpsc::UnboundedSender<TraceEvent>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(store) = &store {
                store.add(event.clone());
            }
            if let Some(writer) = &writer {
                let _ = writer.send(event.clone());
            }
            if let Some(live) = &live {
                let _ = live.send(event);
            }
        }
    })
}
