//! Source resolver implementation.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::git::{GIT_HOSTS, GitSpec, is_slug};
use super::{MaterializedSource, ParsedSource, SourceFetcher, SourceType, SystemFetcher};
use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::fs::contained_path;

/// Resolves source strings into local directories.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    ctx: AppContext,
    fetcher: Arc<dyn SourceFetcher>,
}

impl SourceResolver {
    pub fn new(ctx: AppContext) -> Self {
        Self::with_fetcher(ctx, Arc::new(SystemFetcher::new()))
    }

    pub fn with_fetcher(ctx: AppContext, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { ctx, fetcher }
    }

    /// Classify a source string without touching the network.
    pub fn parse(&self, input: &str) -> Result<ParsedSource> {
        let source = input.trim();
        if source.is_empty() {
            return Err(Error::source_resolution(input, "empty source"));
        }
        let git = |raw: &str, source_type: SourceType| {
            GitSpec::parse(raw)
                .map(|spec| ParsedSource::remote(source, source_type, spec))
                .map_err(|reason| Error::source_resolution(source, reason))
        };

        if let Some(path) = source.strip_prefix("local:") {
            return Ok(self.resolve_local(source, path));
        }
        if source.starts_with("github:") {
            return git(source, SourceType::Shorthand);
        }
        if let Some(rest) = source.strip_prefix("git:") {
            return git(rest, SourceType::Git);
        }
        if is_local_path(source) {
            return Ok(self.resolve_local(source, source));
        }
        if source.starts_with("git@")
            || source.starts_with("ssh://")
            || source.starts_with("git://")
            || source.ends_with(".git")
        {
            return git(source, SourceType::Git);
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            let url = url::Url::parse(source)
                .map_err(|e| Error::source_resolution(source, e.to_string()))?;
            let host = url.host_str().unwrap_or_default();
            let host = host.strip_prefix("www.").unwrap_or(host);
            if GIT_HOSTS.contains(&host) {
                return git(source, SourceType::Git);
            }
            return Ok(ParsedSource {
                original: source.to_string(),
                source_type: SourceType::Url,
                url: url.to_string(),
                local_path: None,
                reference: None,
                subdir: None,
            });
        }
        if looks_like_shorthand(source) {
            return GitSpec::from_github_shorthand(source)
                .map(|spec| ParsedSource::remote(source, SourceType::Shorthand, spec))
                .map_err(|reason| Error::source_resolution(source, reason));
        }

        Err(Error::source_resolution(
            source,
            "unrecognised source (prefix local paths with ./ or use owner/repo, a git URL or an https URL)",
        ))
    }

    /// Parse and materialize in one step.
    pub async fn resolve(&self, input: &str) -> Result<MaterializedSource> {
        let parsed = self.parse(input)?;
        self.materialize(parsed).await
    }

    /// Make the source's files available on local disk.
    ///
    /// Remote sources are fetched into a temporary directory owned by the
    /// returned value; it is removed on drop, including on every error path
    /// here.
    pub async fn materialize(&self, parsed: ParsedSource) -> Result<MaterializedSource> {
        if parsed.source_type == SourceType::Local {
            let path = parsed
                .local_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(&parsed.url));
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(Error::source_resolution(
                    &parsed.original,
                    format!("path does not exist: {}", path.display()),
                ));
            }
            let mut parsed = parsed;
            if let Ok(canonical) = tokio::fs::canonicalize(&path).await {
                parsed.url = canonical.display().to_string();
            }
            return Ok(MaterializedSource::new(parsed, None));
        }

        let temp = tempfile::Builder::new()
            .prefix("loadout-src-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        debug!(source = %parsed.original, dir = %temp.path().display(), "fetching source");
        self.fetcher.fetch(&parsed, temp.path()).await?;

        let root = match &parsed.subdir {
            Some(subdir) => contained_path(temp.path(), subdir)?,
            None => temp.path().to_path_buf(),
        };
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(Error::source_resolution(
                &parsed.original,
                format!(
                    "subdirectory '{}' not found in source",
                    parsed.subdir.as_deref().unwrap_or_default()
                ),
            ));
        }

        let mut parsed = parsed;
        parsed.local_path = Some(root);
        Ok(MaterializedSource::new(parsed, Some(temp)))
    }

    fn resolve_local(&self, original: &str, path: &str) -> ParsedSource {
        let resolved = if path == "~" {
            self.ctx.home_dir().to_path_buf()
        } else if let Some(rest) = path.strip_prefix("~/") {
            self.ctx.home_dir().join(rest)
        } else {
            let p = PathBuf::from(path);
            if p.is_absolute() {
                p
            } else {
                self.ctx.project_root().join(p)
            }
        };

        ParsedSource {
            original: original.to_string(),
            source_type: SourceType::Local,
            url: resolved.display().to_string(),
            local_path: Some(resolved),
            reference: None,
            subdir: None,
        }
    }
}

fn is_local_path(source: &str) -> bool {
    source == "."
        || source == ".."
        || source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('/')
        || source.starts_with('~')
        || source.starts_with(".\\")
        || source.starts_with("..\\")
}

/// `owner/repo` optionally followed by `@ref` or `@ref/path`.
fn looks_like_shorthand(source: &str) -> bool {
    let repo_part = source.split_once('@').map_or(source, |(repo, _)| repo);
    let mut segments = repo_part.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(owner), Some(repo), None) => is_slug(owner) && is_slug(repo),
        _ => false,
    }
}
