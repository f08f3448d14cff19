//! Artifact Record - a persisted pipeline written by a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artifact Record points at one model file written by a run.
///
/// `key` is the artifact key (`model/score/data/ablation`); the same key
/// written twice overwrites the file, so the newest record wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    path: PathBuf,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Artifact key
    /// * `path` - Location of the file
    /// * `size_bytes` - Size of the file in bytes
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            path: path.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Record an existing file, reading its size from disk.
    ///
    /// # Errors
    /// Returns error if the file metadata cannot be read
    pub fn from_file(
        run_id: impl Into<String>,
        key: impl Into<String>,
        path: &Path,
    ) -> std::io::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(run_id, key, path, size))
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
