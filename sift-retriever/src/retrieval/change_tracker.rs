//! Persisted record of which source files have been ingested.
//!
//! The tracker maps a filename to the modification time (nanoseconds since the
//! Unix epoch) it had when it was last ingested. A file is processed again only
//! when its current modification time differs from the recorded one.
//!
//! The map lives in a JSON side file that is always replaced as a whole through
//! [`write_atomic`], so a crash mid-write leaves the previous version readable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use crate::error::{Result, RetrievalError};
use crate::persist::write_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct ProcessedFiles(BTreeMap<String, i64>);

/// Filename to last-modified map with dirty tracking.
#[derive(Debug)]
pub struct ChangeTracker {
    path: PathBuf,
    files: ProcessedFiles,
    dirty: bool,
}

impl ChangeTracker {
    /// Empty tracker that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: ProcessedFiles::default(),
            dirty: false,
        }
    }

    /// Load the tracker stored at `path`. A missing file yields an empty tracker.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No processed files record at {}", path.display());
                return Ok(Self::new(path));
            }
            Err(e) => return Err(e.into()),
        };

        let files: ProcessedFiles = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            "Loaded {} processed file records from {}",
            files.0.len(),
            path.display()
        );
        Ok(Self {
            path,
            files,
            dirty: false,
        })
    }

    /// True if `filename` was never recorded or was recorded with another mtime.
    pub fn should_process(&self, filename: &str, modified_ns: i64) -> bool {
        self.files.0.get(filename) != Some(&modified_ns)
    }

    pub fn record(&mut self, filename: &str, modified_ns: i64) {
        let previous = self.files.0.insert(filename.to_string(), modified_ns);
        if previous != Some(modified_ns) {
            self.dirty = true;
        }
    }

    pub fn get(&self, filename: &str) -> Option<i64> {
        self.files.0.get(filename).copied()
    }

    pub fn len(&self) -> usize {
        self.files.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.0.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the whole map to disk and clear the dirty flag.
    pub async fn persist(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.files)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;
        self.dirty = false;
        Ok(())
    }

    /// Synchronous variant of [`persist`](Self::persist) for contexts that cannot await.
    pub fn persist_blocking(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.files)?;
        write_atomic(&self.path, &bytes)?;
        self.dirty = false;
        Ok(())
    }
}

/// Modification time of a file in nanoseconds since the Unix epoch.
pub fn modified_nanos(metadata: &Metadata) -> Result<i64> {
    let modified = metadata.modified()?;
    let nanos = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()),
        Err(before) => i64::try_from(before.duration().as_nanos()).map(|n| -n),
    };
    nanos.map_err(|_| {
        RetrievalError::Io {
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "modification time out of range",
            ),
        }
    })
}
