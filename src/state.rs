//! Persisted checkpoint state for long-running scans (backfill, DLQ
//! reprocessing): which ids have already been handled, plus free-form
//! stats, so a restarted run resumes instead of redoing work.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read checkpoint file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write checkpoint file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub processed_ids: HashSet<String>,
    #[serde(default)]
    pub stats: serde_json::Value,
    pub last_update: DateTime<Utc>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            processed_ids: HashSet::new(),
            stats: serde_json::json!({}),
            last_update: Utc::now(),
        }
    }
}

impl CheckpointState {
    /// Load the checkpoint from `path`, returning a fresh empty state if the
    /// file does not exist yet (first run).
    pub fn load(path: &Path) -> Result<Self, StateError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StateError::Parse {
                path: path.display().to_string(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StateError::Read {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let serialized = serde_json::to_string_pretty(self).expect("checkpoint state always serializes");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StateError::Write {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, serialized).map_err(|e| StateError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn mark_processed(&mut self, id: impl Into<String>) {
        self.processed_ids.insert(id.into());
        self.last_update = Utc::now();
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed_ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_default_state() {
        let state = CheckpointState::load(Path::new("/nonexistent/checkpoint.json")).unwrap();
        assert!(state.processed_ids.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_processed_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut state = CheckpointState::default();
        state.mark_processed("doc-1");
        state.mark_processed("doc-2");
        state.save(&path).unwrap();

        let loaded = CheckpointState::load(&path).unwrap();
        assert!(loaded.is_processed("doc-1"));
        assert!(loaded.is_processed("doc-2"));
        assert!(!loaded.is_processed("doc-3"));
    }
}
