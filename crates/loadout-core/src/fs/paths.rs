//! Path containment checks for declared resource file names.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Join `relative` onto `root`, rejecting anything that could resolve outside it.
///
/// Absolute paths, drive prefixes and `..` segments are refused. `.` segments
/// are dropped. An empty result is refused as well since it would name the
/// root itself.
pub fn contained_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let escape = || Error::PathEscape {
        path: relative.to_string(),
        root: root.to_path_buf(),
    };

    // Backslashes are separators on Windows; treat them as such everywhere so
    // a declared "..\\x" cannot slip through on unix and escape once copied.
    let normalized = relative.replace('\\', "/");
    let candidate = Path::new(&normalized);

    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for component in candidate.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(escape());
            }
        }
    }

    if depth == 0 {
        return Err(escape());
    }
    Ok(joined)
}

/// Resource names become file and directory names; they must be a single
/// plain path segment.
pub fn validate_resource_name(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("name '{}' is not a valid file name", name));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(format!("name '{}' must not contain path separators", name));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(format!("name '{}' contains control characters", name));
    }
    Ok(())
}
