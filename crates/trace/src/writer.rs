//! Durable JSONL persistence for trace events.
//!
//! One file per run at `<run_id>_<start_millis>.jsonl`, one JSON object per
//! line. Files are only appended to while a run is active. Appends for a
//! run must preserve event order, so production use funnels events through
//! the single sequential task spawned by [`TraceWriter::spawn`]; persistence
//! failures are logged and never affect the run.

use crate::TraceError;
use crate::event::{RunStatus, TraceEvent, TracePayload};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Summary metadata parsed from a run file's first and last lines.
#[derive(Debug, Clone)]
pub struct RunFileMeta {
    pub filename: String,
    pub run_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_count: usize,
    /// First line's user message, when the file starts with a start event.
    pub user_message: Option<String>,
    /// Last line's terminal status, when the run has ended.
    pub status: Option<RunStatus>,
    pub duration_ms: Option<u64>,
}

/// Append-only writer of per-run JSONL trace files.
pub struct TraceWriter {
    dir: PathBuf,
    /// run id -> filename, populated lazily on first append.
    files: Mutex<HashMap<String, String>>,
}

impl TraceWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Create the backing directory if absent. Idempotent.
    pub async fn ensure_dir(&self) -> Result<(), TraceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn filename(run_id: &str, timestamp_millis: i64) -> String {
        format!("{run_id}_{timestamp_millis}.jsonl")
    }

    /// Append one event as a JSON line to its run's file, creating the
    /// file on first write for that run.
    pub async fn append(&self, event: &TraceEvent) -> Result<(), TraceError> {
        let fname = {
            let mut files = self.files.lock().expect("trace writer poisoned");
            files
                .entry(event.run_id.clone())
                .or_insert_with(|| {
                    Self::filename(&event.run_id, event.timestamp.timestamp_millis())
                })
                .clone()
        };

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(&fname))
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// List all run files with metadata parsed from their first and last
    /// lines, newest-first by filename. Unparseable files are skipped.
    pub async fn list_runs(&self) -> Result<Vec<RunFileMeta>, TraceError> {
        let mut names: Vec<String> = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".jsonl") {
                names.push(name);
            }
        }
        names.sort();
        names.reverse();

        let mut results = Vec::new();
        for name in names {
            match self.parse_meta(&name).await {
                Ok(meta) => results.push(meta),
                Err(e) => {
                    debug!(file = %name, error = %e, "Skipping unparseable trace file");
                }
            }
        }
        Ok(results)
    }

    async fn parse_meta(&self, filename: &str) -> Result<RunFileMeta, TraceError> {
        let content = tokio::fs::read_to_string(self.dir.join(filename)).await?;
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let first_line = lines.next().ok_or_else(|| {
            TraceError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "empty trace file",
            ))
        })?;
        let first: TraceEvent = serde_json::from_str(first_line)?;

        let mut count = 1usize;
        let mut last = first.clone();
        for line in lines {
            last = serde_json::from_str(line)?;
            count += 1;
        }

        let user_message = match &first.payload {
            TracePayload::Start { user_message, .. } => Some(user_message.clone()),
            _ => None,
        };
        let (status, duration_ms) = match &last.payload {
            TracePayload::End {
                status,
                duration_ms,
                ..
            } => (Some(*status), Some(*duration_ms)),
            _ => (None, None),
        };

        Ok(RunFileMeta {
            filename: filename.to_string(),
            run_id: first.run_id,
            timestamp: first.timestamp,
            event_count: count,
            user_message,
            status,
            duration_ms,
        })
    }

    /// Read the full event sequence for a run by filename prefix, or
    /// `None` if no file matches.
    pub async fn read_run(&self, run_id: &str) -> Result<Option<Vec<TraceEvent>>, TraceError> {
        let prefix = format!("{run_id}_");
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut matched: Option<String> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".jsonl") {
                matched = Some(name);
                break;
            }
        }
        let Some(name) = matched else {
            return Ok(None);
        };

        let content = tokio::fs::read_to_string(self.dir.join(&name)).await?;
        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            events.push(serde_json::from_str(line)?);
        }
        Ok(Some(events))
    }

    /// Spawn the sequential persistence task.
    ///
    /// Returns a sender to submit events and the task handle. The task
    /// appends events one at a time, preserving per-run line order;
    /// failures are logged and the stream continues.
    pub fn spawn(
        self: std::sync::Arc<Self>,
    ) -> (mpsc::UnboundedSender<TraceEvent>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<TraceEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = self.append(&event).await {
                    warn!(run_id = %event.run_id, error = %e, "Failed to persist trace event");
                }
            }
        });
        (tx, handle)
    }
}
