//! Crash-safe file replacement.
//!
//! Side files (the change tracker map and the vector index) are rewritten as a
//! whole. They are written to a temporary file in the destination directory,
//! flushed to disk, and renamed over the target, so a reader sees either the old
//! or the new version and never a torn write.

use std::io::Write;
use std::path::Path;

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
