//! Checkpoint store — durable progress marker for resumable runs.
//!
//! The record holds the last processed ordinal index into the
//! stable-ordered universe plus the set of entity ids already completed.
//! A missing or corrupt file is "no progress yet", never fatal. Saves go
//! through a temp file and an atomic rename so a kill mid-write can't leave
//! a torn checkpoint; at most one batch of work is lost.
//!
//! Single-writer by design: concurrent pipeline runs against the same
//! checkpoint file are out of scope and would race.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("write checkpoint: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode checkpoint: {0}")]
    Json(#[from] serde_json::Error),
}

/// Progress marker. Invariant: every id in `completed_ids` sits at an
/// ordinal index ≤ `last_index` in the universe it was recorded against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub last_index: usize,
    pub completed_ids: BTreeSet<String>,
}

impl CheckpointRecord {
    pub fn is_fresh(&self) -> bool {
        self.last_index == 0 && self.completed_ids.is_empty()
    }
}

/// File-backed checkpoint store.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved record, or a zero-valued one when the file is missing
    /// or unreadable. Corruption downgrades to a full restart, it never
    /// aborts the run.
    pub fn load(&self) -> CheckpointRecord {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint, starting from scratch");
                return CheckpointRecord::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable checkpoint, starting from scratch");
                return CheckpointRecord::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt checkpoint, starting from scratch");
                CheckpointRecord::default()
            }
        }
    }

    /// Atomic overwrite: write to a sibling temp file, then rename into
    /// place. Safe to call repeatedly with the same record.
    pub fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove the checkpoint after a fully completed run, so the next
    /// invocation reprocesses the whole universe (including the entities
    /// that failed this time).
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
