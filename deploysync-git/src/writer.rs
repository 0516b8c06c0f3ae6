//! Atomic manifest writer for the working copy.
//!
//! ## Protocol
//!
//! 1. Write the new content to `<path>.deploysync.tmp` next to the target.
//! 2. Copy the target's permissions onto the temp file so git sees no mode change.
//! 3. Rename over the target (atomic on POSIX).
//! 4. On rename failure, remove the temp file and leave the target intact.
//!
//! Content is written byte-for-byte; line endings are never normalised.

use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// Atomically replace `path` with `content`.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.deploysync.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<(), SyncError> {
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Ok(meta) = std::fs::metadata(path) {
        if let Err(e) = std::fs::set_permissions(tmp, meta.permissions()) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(tmp, e));
        }
    }

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::debug!(path = %path.display(), bytes = content.len(), "manifest written");
    Ok(())
}
