use crate::error::{Result, SessionsError};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
///
/// Readers observe either the previous file or the new one, never a partial write.
/// On failure the previous file is left untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let store_err = |source: std::io::Error| SessionsError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(store_err)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(store_err)?;
    tmp.write_all(data).map_err(store_err)?;
    tmp.as_file().sync_all().map_err(store_err)?;
    tmp.persist(path).map_err(|e| store_err(e.error))?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Move an unreadable document aside as `<name>.corrupt-<timestamp>` and return the new path.
pub fn backup_corrupt(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let backup = path.with_file_name(format!("{file_name}.corrupt-{stamp}"));
    std::fs::rename(path, &backup)?;
    Ok(backup)
}
