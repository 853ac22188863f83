//! Error taxonomy for resource lifecycle operations.
//!
//! Every variant carries enough context (resource name, type, path) for the
//! caller to report the failure precisely. Nothing here is retried.

use std::path::{Path, PathBuf};

use crate::agent::Agent;
use crate::resource::ResourceType;
use crate::types::Scope;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source string could not be classified or materialized.
    #[error("Cannot resolve source '{source_ref}': {reason}")]
    SourceResolution { source_ref: String, reason: String },

    /// The target agent is outside a handler's declared support set.
    #[error("Agent '{agent}' does not support {resource_type} resources")]
    UnsupportedAgent {
        agent: Agent,
        resource_type: ResourceType,
    },

    /// The destination is already populated and force was not given.
    #[error(
        "{resource_type} '{name}' already exists at {} ({agent}, {scope}). Use --force to overwrite.",
        .path.display()
    )]
    Conflict {
        resource_type: ResourceType,
        name: String,
        agent: Agent,
        scope: Scope,
        path: PathBuf,
    },

    /// Remove/update target is not tracked or not present.
    #[error("{resource_type} '{name}' not found{}", location_suffix(.path.as_deref()))]
    NotFound {
        resource_type: ResourceType,
        name: String,
        path: Option<PathBuf>,
    },

    /// Resource content failed shape validation.
    #[error("Invalid {resource_type} '{name}': {}", .errors.join("; "))]
    Validation {
        resource_type: ResourceType,
        name: String,
        errors: Vec<String>,
    },

    /// A declared file path would resolve outside its install root.
    #[error("Path '{path}' escapes install root {}", .root.display())]
    PathEscape { path: String, root: PathBuf },

    /// Malformed structured content (JSON, YAML frontmatter, TOML).
    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Filesystem failure other than not-found.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plugin descriptor or lifecycle failure.
    #[error("Plugin '{id}': {reason}")]
    Plugin { id: String, reason: String },

    /// No install target could be derived for the request.
    #[error("No install targets for {resource_type}: {reason}")]
    NoTargets {
        resource_type: ResourceType,
        reason: String,
    },

    /// A multi-target operation stopped after completing some targets.
    #[error("{source} (completed before failure: {})", describe_completed(.completed))]
    PartialInstall {
        completed: Vec<String>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl ToString) -> Self {
        Error::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn source_resolution(source_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SourceResolution {
            source_ref: source_ref.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict { .. } => true,
            Error::PartialInstall { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

fn location_suffix(path: Option<&Path>) -> String {
    path.map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

fn describe_completed(completed: &[String]) -> String {
    if completed.is_empty() {
        "none".to_string()
    } else {
        completed.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_resource_and_path() {
        let err = Error::Conflict {
            resource_type: ResourceType::Hook,
            name: "fmt".to_string(),
            agent: Agent::ClaudeCode,
            scope: Scope::Project,
            path: PathBuf::from("/p/.claude/hooks/fmt.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("hook 'fmt' already exists"));
        assert!(msg.contains("/p/.claude/hooks/fmt.json"));
        assert!(msg.contains("claude-code"));
    }

    #[test]
    fn partial_install_reports_completed_targets() {
        let err = Error::PartialInstall {
            completed: vec!["claude-code/project".to_string()],
            source: Box::new(Error::NotFound {
                resource_type: ResourceType::Mcp,
                name: "alpha".to_string(),
                path: None,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("mcp 'alpha' not found"));
        assert!(msg.contains("claude-code/project"));
        assert!(!err.is_conflict());
    }
}
