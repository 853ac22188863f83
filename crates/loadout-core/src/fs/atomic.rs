//! Atomic file replacement (temp file + rename in the same directory).

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Write `bytes` to `path` atomically, creating parent directories.
///
/// The temp file lives next to the target so the rename never crosses a
/// filesystem boundary. This does not lock against other processes.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::io(path, std::io::Error::other("path has no parent directory")))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::io(parent, e))?;

    let tmp_path = tmp_path_for(path);
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| Error::io(&tmp_path, e))?;

    // Windows rename does not replace an existing target.
    #[cfg(windows)]
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| Error::io(path, e))?;
    }

    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::io(path, err));
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}
