//! Resource data model shared by every handler.

pub mod frontmatter;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::Agent;
use crate::fs::InstallMode;
use crate::types::Scope;

/// Resource-type tag used for handler dispatch and ledger namespacing.
///
/// Built-in kinds have fixed tags; plugin kinds carry their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Skill,
    Subagent,
    Hook,
    Mcp,
    Other(String),
}

impl ResourceType {
    pub const BUILTIN: [ResourceType; 4] = [
        ResourceType::Skill,
        ResourceType::Subagent,
        ResourceType::Hook,
        ResourceType::Mcp,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Skill => "skill",
            ResourceType::Subagent => "subagent",
            ResourceType::Hook => "hook",
            ResourceType::Mcp => "mcp",
            ResourceType::Other(tag) => tag,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, ResourceType::Other(_))
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "skill" | "skills" => ResourceType::Skill,
            "subagent" | "subagents" | "agent" | "agents" => ResourceType::Subagent,
            "hook" | "hooks" => ResourceType::Hook,
            "mcp" | "mcp-server" | "mcpserver" => ResourceType::Mcp,
            _ => ResourceType::Other(value),
        }
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        ResourceType::from(value.to_string())
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        match value {
            ResourceType::Other(tag) => tag,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One declared file of a resource, relative to the resource's install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    pub path: String,
    pub content: String,
}

impl ResourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A named, typed unit of agent-facing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: ResourceType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub files: Vec<ResourceFile>,
}

impl Resource {
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
            description: None,
            metadata: Map::new(),
            files: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push(ResourceFile::new(path, content));
        self
    }

    /// Content of the declared file at `path`, if any.
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_str())
    }
}

/// One deployment destination for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallTarget {
    pub agent: Agent,
    pub scope: Scope,
    #[serde(default)]
    pub mode: InstallMode,
}

impl InstallTarget {
    pub fn new(agent: Agent, scope: Scope, mode: InstallMode) -> Self {
        Self { agent, scope, mode }
    }

    /// Short `agent/scope` label used in reports.
    pub fn label(&self) -> String {
        format!("{}/{}", self.agent, self.scope)
    }
}

/// Where a resource physically lives after install.
///
/// For document-backed kinds `path` is the shared document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub agent: Agent,
    pub scope: Scope,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<InstallMode>,
}

impl Installation {
    pub fn new(agent: Agent, scope: Scope, path: PathBuf) -> Self {
        Self {
            agent,
            scope,
            path,
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Identity of a location, ignoring delivery mode.
    pub fn same_location(&self, other: &Installation) -> bool {
        self.agent == other.agent && self.scope == other.scope && self.path == other.path
    }
}

/// A resource as seen on disk, enriched with ledger provenance when tracked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledResource {
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub installed_for: Vec<Installation>,
}

impl InstalledResource {
    pub fn from_disk(resource: Resource, installation: Installation) -> Self {
        Self {
            resource,
            source: None,
            source_type: None,
            source_url: None,
            installed_at: None,
            updated_at: None,
            installed_for: vec![installation],
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }

    /// Add a location unless an identical one is already listed.
    pub fn add_installation(&mut self, installation: Installation) {
        if !self
            .installed_for
            .iter()
            .any(|i| i.same_location(&installation))
        {
            self.installed_for.push(installation);
        }
    }
}

/// A tolerated failure while listing one (agent, scope) location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListError {
    pub agent: Agent,
    pub scope: Scope,
    pub error: String,
}

/// Outcome of `list`: merged resources plus per-location failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListResult {
    pub resources: Vec<InstalledResource>,
    pub errors: Vec<ListError>,
}

impl ListResult {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.errors.is_empty()
    }

    /// Record a resource found at one location, merging by name.
    pub fn push(&mut self, resource: Resource, installation: Installation) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource.name == resource.name)
        {
            Some(existing) => existing.add_installation(installation),
            None => self
                .resources
                .push(InstalledResource::from_disk(resource, installation)),
        }
    }

    pub fn push_error(&mut self, agent: Agent, scope: Scope, error: impl ToString) {
        self.errors.push(ListError {
            agent,
            scope,
            error: error.to_string(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&InstalledResource> {
        self.resources.iter().find(|r| r.name() == name)
    }

    /// Fold another result into this one, merging by name.
    pub fn extend(&mut self, other: ListResult) {
        for installed in other.resources {
            match self
                .resources
                .iter_mut()
                .find(|r| r.resource.name == installed.resource.name)
            {
                Some(existing) => {
                    for installation in installed.installed_for {
                        existing.add_installation(installation);
                    }
                }
                None => self.resources.push(installed),
            }
        }
        self.errors.extend(other.errors);
    }
}

/// Result of shape validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_round_trips_through_string() {
        let json = serde_json::to_string(&ResourceType::Subagent).expect("serialize");
        assert_eq!(json, "\"subagent\"");

        let parsed: ResourceType = serde_json::from_str("\"prompt\"").expect("deserialize");
        assert_eq!(parsed, ResourceType::Other("prompt".to_string()));
        assert_eq!(ResourceType::from("Hooks"), ResourceType::Hook);
    }

    #[test]
    fn list_result_merges_locations_by_name() {
        let mut result = ListResult::default();
        let hook = Resource::new(ResourceType::Hook, "fmt");

        result.push(
            hook.clone(),
            Installation::new(Agent::ClaudeCode, Scope::Project, "/p/a".into()),
        );
        result.push(
            hook.clone(),
            Installation::new(Agent::Cursor, Scope::Project, "/p/b".into()),
        );
        result.push(
            hook,
            Installation::new(Agent::Cursor, Scope::Project, "/p/b".into()),
        );

        assert_eq!(result.resources.len(), 1);
        assert_eq!(result.resources[0].installed_for.len(), 2);
    }

    #[test]
    fn validation_report_valid_tracks_errors() {
        assert!(ValidationReport::from_parts(vec![], vec!["w".into()]).valid);
        assert!(!ValidationReport::from_parts(vec!["e".into()], vec![]).valid);
    }
}
