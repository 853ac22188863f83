//! Materialize resource files at a destination in copy or symlink mode.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use super::atomic::write_atomic;
use super::install_mode::InstallMode;
use crate::error::{Error, Result};

/// True if something (file, directory or dangling symlink) sits at `path`.
pub async fn path_occupied(path: &Path) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(Error::io(path, err)),
    }
}

/// Remove whatever sits at `path`. Symlinks are unlinked, never followed.
///
/// Returns the raw io error so callers can distinguish not-found.
pub async fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Place `content` at `dest`.
///
/// Copy mode writes the bytes directly. Symlink mode writes them to
/// `canonical` and links `dest` to it; where symlinks are unavailable it
/// downgrades to a copy. Returns the mode actually used. Any existing entry
/// at `dest` is replaced, so callers must have done their conflict check.
pub async fn place_file(
    dest: &Path,
    content: &str,
    mode: InstallMode,
    canonical: Option<&Path>,
) -> Result<InstallMode> {
    if path_occupied(dest).await? {
        remove_path(dest).await.map_err(|e| Error::io(dest, e))?;
    }

    match (mode, canonical) {
        (InstallMode::Symlink, Some(canonical)) => {
            write_atomic(canonical, content.as_bytes()).await?;
            match link(canonical, dest).await {
                Ok(()) => Ok(InstallMode::Symlink),
                Err(err) => {
                    debug!(
                        dest = %dest.display(),
                        error = %err,
                        "symlink unavailable, falling back to copy"
                    );
                    write_atomic(dest, content.as_bytes()).await?;
                    Ok(InstallMode::Copy)
                }
            }
        }
        _ => {
            write_atomic(dest, content.as_bytes()).await?;
            Ok(InstallMode::Copy)
        }
    }
}

#[cfg(unix)]
async fn link(target: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::symlink(target, dest).await
}

#[cfg(not(unix))]
async fn link(_target: &Path, _dest: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "file symlinks require elevated privileges on this platform",
    ))
}
