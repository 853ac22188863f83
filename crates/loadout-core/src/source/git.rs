//! Git source specification.

use serde::{Deserialize, Serialize};

/// Hosts whose https URLs are treated as git repositories.
pub const GIT_HOSTS: &[&str] = &["github.com", "gitlab.com"];

/// Repository location plus optional ref and subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSpec {
    /// Repository URL (e.g., "https://github.com/org/repo")
    pub repo_url: String,
    /// Git reference (branch, tag, or commit SHA)
    pub reference: Option<String>,
    /// Subdirectory within the repository
    pub subdir: Option<String>,
}

impl GitSpec {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            reference: None,
            subdir: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    /// Parse a git source string.
    ///
    /// Supports formats:
    /// - `git:https://github.com/org/repo`
    /// - `github:org/repo`, `github:org/repo@ref`, `github:org/repo@ref/path`
    /// - `https://github.com/org/repo/tree/ref/path`
    /// - `git@github.com:org/repo.git`, `ssh://...`, `git://...`
    pub fn parse(source: &str) -> Result<Self, String> {
        let raw = source.strip_prefix("git:").unwrap_or(source);
        if let Some(shorthand) = raw.strip_prefix("github:") {
            return Self::from_github_shorthand(shorthand);
        }

        if let Some((repo, reference, subdir)) = split_tree_path(raw) {
            if subdir.is_empty() {
                return Err("Git URL is missing a path after /tree/<ref>/".to_string());
            }
            return Ok(Self::new(repo)
                .with_reference(reference)
                .with_subdir(subdir));
        }

        if raw.is_empty() {
            return Err("empty repository URL".to_string());
        }
        Ok(Self::new(raw.trim_end_matches('/')))
    }

    /// Expand `org/repo[@ref[/path]]` to a GitHub spec.
    pub fn from_github_shorthand(shorthand: &str) -> Result<Self, String> {
        let (repo_part, rest) = match shorthand.split_once('@') {
            Some((repo, rest)) => (repo, Some(rest)),
            None => (shorthand, None),
        };

        let segments: Vec<&str> = repo_part.trim_matches('/').split('/').collect();
        let (owner, repo, path) = match segments.as_slice() {
            [owner, repo] => (*owner, *repo, None),
            [owner, repo, path @ ..] if rest.is_none() => (*owner, *repo, Some(path.join("/"))),
            _ => return Err(format!("expected owner/repo, got '{shorthand}'")),
        };
        if !is_slug(owner) || !is_slug(repo) {
            return Err(format!("invalid GitHub repository '{owner}/{repo}'"));
        }

        let mut spec = Self::new(format!("https://github.com/{owner}/{repo}"));
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            spec = spec.with_subdir(path);
        }
        if let Some(rest) = rest {
            let (reference, path) = match rest.split_once('/') {
                Some((reference, path)) => (reference, Some(path)),
                None => (rest, None),
            };
            if reference.is_empty() {
                return Err(format!("empty ref in '{shorthand}'"));
            }
            spec = spec.with_reference(reference);
            if let Some(path) = path.filter(|p| !p.is_empty()) {
                spec = spec.with_subdir(path);
            }
        }
        Ok(spec)
    }
}

/// `owner`/`repo` component: letters, digits, `-`, `_`, `.`.
pub fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Split a URL with /tree/ pattern into (repo, ref, subdir).
fn split_tree_path(raw: &str) -> Option<(String, String, String)> {
    let marker = "/tree/";
    let idx = raw.find(marker)?;
    let repo = raw[..idx].to_string();
    let rest = &raw[idx + marker.len()..];
    let mut parts = rest.splitn(2, '/');
    let reference = parts.next()?.to_string();
    let subdir = parts.next().unwrap_or("").trim_end_matches('/').to_string();
    Some((repo, reference, subdir))
}
