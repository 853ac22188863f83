//! Fetch remote sources into a local directory.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ParsedSource, SourceType};
use crate::error::{Error, Result};
use crate::fs::{contained_path, write_atomic};

/// Materializes a remote source into `dest`, an existing empty directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, source: &ParsedSource, dest: &Path) -> Result<()>;
}

/// Default fetcher: the `git` CLI for repositories, HTTP GET for plain URLs.
#[derive(Debug, Clone, Default)]
pub struct SystemFetcher {
    client: reqwest::Client,
}

impl SystemFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn clone_repo(&self, source: &ParsedSource, dest: &Path) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        let mut args = vec!["clone", "--depth", "1", "--quiet"];
        if let Some(reference) = &source.reference {
            args.extend(["--branch", reference.as_str()]);
        }
        args.extend([source.url.as_str(), dest_str.as_ref()]);

        run_git(&args)
            .await
            .map_err(|reason| Error::source_resolution(&source.original, reason))
    }

    async fn download(&self, source: &ParsedSource, dest: &Path) -> Result<()> {
        let fail = |reason: String| Error::source_resolution(&source.original, reason);

        let url = url::Url::parse(&source.url).map_err(|e| fail(e.to_string()))?;
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("resource")
            .to_string();
        let target = contained_path(dest, &file_name)?;

        debug!(url = %url, "downloading source");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        write_atomic(&target, &bytes).await
    }
}

#[async_trait]
impl SourceFetcher for SystemFetcher {
    async fn fetch(&self, source: &ParsedSource, dest: &Path) -> Result<()> {
        match source.source_type {
            SourceType::Git | SourceType::Shorthand => self.clone_repo(source, dest).await,
            SourceType::Url => self.download(source, dest).await,
            SourceType::Local => Err(Error::source_resolution(
                &source.original,
                "local sources are not fetched",
            )),
        }
    }
}

/// Run a git command, returning stderr as the error text on failure.
async fn run_git(args: &[&str]) -> std::result::Result<(), String> {
    debug!(?args, "running git");
    let output = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .map_err(|e| format!("Failed to run git {args:?}: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("Git command failed {args:?}: {}", stderr.trim()));
    }
    Ok(())
}
