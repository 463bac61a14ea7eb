//! Execution event contract and append-only sinks.
//!
//! Every step lifecycle transition and every command execution produces one
//! `ExecutionEvent`. Events are emitted in true execution order; sinks must
//! not buffer or reorder them for cosmetic grouping. The file sink writes
//! one JSON record per line and flushes after each event so an external
//! viewer can tail the log while a run is in progress.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::step::StepId;

/// Current unix time in seconds. Falls back to 0 if the clock reads before
/// the epoch, which is acceptable for log timestamps.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// What happened: a step lifecycle transition or a command sub-event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING-KEBAB-CASE")]
pub enum EventKind {
    /// Step invocation started
    Start,
    /// Step completed and progress was committed
    Done,
    /// Step body reported failure
    Failed { cause: String },
    /// User declined or canceled at the confirmation gate
    Canceled,
    /// Command is about to run (or be simulated)
    Run { command: String },
    /// Command exited successfully
    RunOk { command: String },
    /// Command exited non-zero
    RunFail { command: String, rc: i32 },
}

/// One append-only log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub timestamp: u64,
    /// Owning step, if any. Command sub-events always carry one.
    pub step: Option<StepId>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ExecutionEvent {
    pub fn new(step: Option<StepId>, kind: EventKind) -> Self {
        Self {
            timestamp: now_unix(),
            step,
            kind,
        }
    }
}

/// Destination for execution events.
pub trait EventSink {
    fn emit(&mut self, event: &ExecutionEvent) -> Result<()>;
}

/// Append-only JSON-lines event log on disk.
pub struct FileEventLog {
    path: PathBuf,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileEventLog {
    fn emit(&mut self, event: &ExecutionEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests and the interactive session view.
///
/// Clones share the same backing storage, so callers can keep a handle and
/// inspect events after handing the sink to the orchestrator.
#[derive(Clone, Default)]
pub struct MemoryEventLog {
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events emitted so far, in emission order.
    pub fn snapshot(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .expect("MemoryEventLog mutex poisoned")
            .clone()
    }
}

impl EventSink for MemoryEventLog {
    fn emit(&mut self, event: &ExecutionEvent) -> Result<()> {
        self.events
            .lock()
            .expect("MemoryEventLog mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}
