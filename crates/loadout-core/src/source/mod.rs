//! Source resolution: classify a source string and materialize it locally.
//!
//! Supported inputs:
//! - `./path`, `../path`, `/abs`, `~/path`, `local:<path>` (local)
//! - `git:<url>`, `git@host:org/repo.git`, `ssh://...`, `git://...`, `*.git`,
//!   and https URLs on github.com / gitlab.com (git)
//! - `github:org/repo[@ref[/path]]` and bare `org/repo[@ref]` (shorthand)
//! - any other http(s) URL (url: a single downloaded file)

pub mod fetcher;
pub mod git;
pub mod resolver;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

pub use fetcher::{SourceFetcher, SystemFetcher};
pub use git::GitSpec;
pub use resolver::SourceResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Git,
    Shorthand,
    Url,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Local => "local",
            SourceType::Git => "git",
            SourceType::Shorthand => "shorthand",
            SourceType::Url => "url",
        }
    }

    pub fn is_remote(self) -> bool {
        !matches!(self, SourceType::Local)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSource {
    /// The string the user gave
    pub original: String,
    pub source_type: SourceType,
    /// Clone/download URL, or the absolute path for local sources
    /// (canonical once materialized)
    pub url: String,
    /// Local directory holding the raw files, once materialized
    pub local_path: Option<PathBuf>,
    pub reference: Option<String>,
    pub subdir: Option<String>,
}

impl ParsedSource {
    /// A local directory, already materialized.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            original: path.display().to_string(),
            source_type: SourceType::Local,
            url: path.display().to_string(),
            local_path: Some(path),
            reference: None,
            subdir: None,
        }
    }

    pub(crate) fn remote(original: &str, source_type: SourceType, spec: GitSpec) -> Self {
        Self {
            original: original.to_string(),
            source_type,
            url: spec.repo_url,
            local_path: None,
            reference: spec.reference,
            subdir: spec.subdir,
        }
    }
}

/// A source with its files on local disk.
///
/// Remote sources live in a temporary directory that is removed when this
/// value is dropped, whether the command succeeded or not.
#[derive(Debug)]
pub struct MaterializedSource {
    pub parsed: ParsedSource,
    guard: Option<TempDir>,
}

impl MaterializedSource {
    pub(crate) fn new(parsed: ParsedSource, guard: Option<TempDir>) -> Self {
        Self { parsed, guard }
    }

    pub fn source(&self) -> &ParsedSource {
        &self.parsed
    }

    /// Whether a temporary checkout backs this source.
    pub fn is_temporary(&self) -> bool {
        self.guard.is_some()
    }

    /// Remove the temporary checkout now instead of on drop.
    pub fn cleanup(mut self) -> std::io::Result<()> {
        match self.guard.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}
