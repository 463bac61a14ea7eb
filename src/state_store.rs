//! Durable resume state.
//!
//! The state file records the last completed step and the last run time,
//! nothing more. It is mutated only by the orchestrator, and only when a
//! step's outcome is DONE. A crash between a step body succeeding and the
//! commit landing on disk simply re-runs that step on the next session;
//! steps are idempotent by contract, so that is safe.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HostPrepError, Result};
use crate::persist::write_atomic;
use crate::step::StepId;

/// Persisted progress record.
///
/// Schema evolution is append-only: new fields must carry `serde(default)`
/// values that preserve prior semantics, and fields written by newer
/// versions survive a load/save round-trip through this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistentState {
    /// Last step whose outcome was DONE, or None on a fresh install.
    #[serde(default)]
    pub last_completed_step: Option<StepId>,

    /// Unix seconds of the most recent commit.
    #[serde(default)]
    pub last_run_time: Option<u64>,

    /// Fields from newer versions, preserved verbatim.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// File-backed store for `PersistentState`.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current state. A missing file is a fresh install and yields
    /// the default state; an unreadable or malformed file is a persistence
    /// error, never silently treated as fresh.
    pub fn load(&self) -> Result<PersistentState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                HostPrepError::persistence(format!(
                    "state file {} is malformed: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistentState::default()),
            Err(e) => Err(HostPrepError::persistence(format!(
                "cannot read state file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Record that `id` completed at `timestamp`. Atomic: either the new
    /// state is fully on disk or the previous file is intact.
    ///
    /// Commit never moves the resume point backwards: re-running an
    /// already-completed step keeps the later of the two IDs, so idempotent
    /// re-runs cannot regress progress. `last_run_time` always updates.
    pub fn commit(&self, id: StepId, timestamp: u64) -> Result<()> {
        let mut state = self.load()?;
        state.last_completed_step = match state.last_completed_step {
            Some(prev) if prev > id => Some(prev),
            _ => Some(id),
        };
        state.last_run_time = Some(timestamp);

        let json = serde_json::to_string_pretty(&state)?;
        write_atomic(&self.path, &json)?;
        log::debug!("committed step {} at {}", id, timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_fresh_install_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = store(&dir).load().unwrap();
        assert_eq!(state.last_completed_step, None);
        assert_eq!(state.last_run_time, None);
    }

    #[test]
    fn test_commit_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.commit(StepId(1), 100).unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.last_completed_step, Some(StepId(1)));
        assert_eq!(state.last_run_time, Some(100));

        store.commit(StepId(2), 200).unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.last_completed_step, Some(StepId(2)));
        assert_eq!(state.last_run_time, Some(200));
    }

    #[test]
    fn test_commit_never_regresses() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.commit(StepId(3), 100).unwrap();
        // re-running step 1 after step 3 completed
        store.commit(StepId(1), 200).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.last_completed_step, Some(StepId(3)));
        assert_eq!(state.last_run_time, Some(200));
    }

    #[test]
    fn test_malformed_file_is_an_error_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let err = StateStore::new(&path).load().unwrap_err();
        assert!(matches!(err, HostPrepError::Persistence(_)));
    }

    #[test]
    fn test_unknown_fields_survive_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"last_completed_step":1,"last_run_time":50,"future_field":"kept"}"#,
        )
        .unwrap();

        let store = StateStore::new(&path);
        store.commit(StepId(2), 60).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["future_field"], "kept");
        assert_eq!(raw["last_completed_step"], 2);
    }
}
