//! Tool-use hooks: one JSON file per hook under the agent's hooks directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::files::{EntryShape, FileStore, discovery_candidates, stem_name};
use super::{
    DiscoverOptions, HandlerEnv, InstallOptions, RemoveOptions, ResourceHandler, ensure_valid,
    resolve_roots, sibling_roots, source_dir, table_install_path,
};
use crate::agent::{Agent, AgentRegistry};
use crate::error::{Error, Result};
use crate::fs::validate_resource_name;
use crate::resource::{
    InstallTarget, Installation, ListResult, Resource, ResourceFile, ResourceType,
    ValidationReport,
};
use crate::source::ParsedSource;
use crate::types::{ListScope, Scope};

/// Lifecycle points a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookType {
    PreToolUse,
    PostToolUse,
    Notification,
    UserPromptSubmit,
    Stop,
    SubagentStop,
    PreCompact,
    SessionStart,
    SessionEnd,
}

impl HookType {
    pub const ALL: [HookType; 9] = [
        HookType::PreToolUse,
        HookType::PostToolUse,
        HookType::Notification,
        HookType::UserPromptSubmit,
        HookType::Stop,
        HookType::SubagentStop,
        HookType::PreCompact,
        HookType::SessionStart,
        HookType::SessionEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookType::PreToolUse => "PreToolUse",
            HookType::PostToolUse => "PostToolUse",
            HookType::Notification => "Notification",
            HookType::UserPromptSubmit => "UserPromptSubmit",
            HookType::Stop => "Stop",
            HookType::SubagentStop => "SubagentStop",
            HookType::PreCompact => "PreCompact",
            HookType::SessionStart => "SessionStart",
            HookType::SessionEnd => "SessionEnd",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        HookType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown hookType '{s}'"))
    }
}

/// On-disk hook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDefinition {
    pub hook_type: HookType,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HookDefinition {
    pub fn new(hook_type: HookType, command: impl Into<String>) -> Self {
        Self {
            hook_type,
            command: command.into(),
            tools: None,
            description: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct HookHandler {
    store: FileStore,
    agents: Vec<Agent>,
}

impl HookHandler {
    pub fn new(env: HandlerEnv) -> Self {
        let agents = AgentRegistry::default().supporting(&ResourceType::Hook);
        Self {
            store: FileStore::new(
                env,
                ResourceType::Hook,
                EntryShape::File {
                    extension: "json".to_string(),
                },
            ),
            agents,
        }
    }

    /// Build a hook resource whose single file is the rendered JSON body.
    pub fn resource(name: impl Into<String>, definition: &HookDefinition) -> Result<Resource> {
        let name = name.into();
        let body = serde_json::to_string_pretty(definition)
            .map_err(|e| Error::parse(format!("{name}.json"), e))?;
        let metadata = match serde_json::to_value(definition) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Ok(Resource {
            resource_type: ResourceType::Hook,
            description: definition.description.clone(),
            files: vec![ResourceFile::new(format!("{name}.json"), body)],
            metadata,
            name,
        })
    }

    fn decode(name: &str, files: Vec<ResourceFile>, path: &Path) -> Result<Resource> {
        let content = files
            .first()
            .map(|f| f.content.as_str())
            .unwrap_or_default();
        let definition: HookDefinition =
            serde_json::from_str(content).map_err(|e| Error::parse(path, e))?;
        Self::resource(name, &definition)
    }

    fn locations(&self, scope: ListScope) -> Vec<(Agent, Scope, PathBuf)> {
        let mut locations = Vec::new();
        for agent in &self.agents {
            for scope in scope.scopes() {
                if let Ok(root) = self.install_path(*agent, *scope) {
                    locations.push((*agent, *scope, root));
                }
            }
        }
        locations
    }
}

#[async_trait]
impl ResourceHandler for HookHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Hook
    }

    fn supported_agents(&self) -> Vec<Agent> {
        self.agents.clone()
    }

    fn install_path(&self, agent: Agent, scope: Scope) -> Result<PathBuf> {
        table_install_path(
            &self.store.env().ctx,
            &ResourceType::Hook,
            &self.agents,
            agent,
            scope,
        )
    }

    async fn discover(
        &self,
        source: &ParsedSource,
        options: &DiscoverOptions,
    ) -> Result<Vec<Resource>> {
        let root = source_dir(source)?;
        let mut found = Vec::new();

        for path in discovery_candidates(root).await? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                debug!(path = %path.display(), "skipping unreadable file");
                continue;
            };
            let Ok(Value::Object(raw)) = serde_json::from_str::<Value>(&content) else {
                continue;
            };
            if !raw.contains_key("hookType") {
                continue;
            }

            let name = raw
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| stem_name(&path));
            let Some(name) = name else { continue };
            if !options.accepts(&name) {
                continue;
            }

            let parsed = serde_json::from_value::<HookDefinition>(Value::Object(raw.clone()));
            let resource = match parsed {
                Ok(definition) => Self::resource(name, &definition)?,
                // Keep the raw body so validation can explain what is wrong.
                Err(_) => Resource {
                    resource_type: ResourceType::Hook,
                    files: vec![ResourceFile::new(format!("{name}.json"), content)],
                    description: None,
                    metadata: raw,
                    name,
                },
            };
            found.push(resource);
        }
        Ok(found)
    }

    async fn install(
        &self,
        resource: &Resource,
        targets: &[InstallTarget],
        options: &InstallOptions,
    ) -> Result<Vec<Installation>> {
        ensure_valid(resource, self.validate(resource))?;
        let roots = resolve_roots(self, targets)?;

        let mut metadata = Map::new();
        if let Some(hook_type) = resource.metadata.get("hookType") {
            metadata.insert("hookType".to_string(), hook_type.clone());
        }
        self.store.install(resource, &roots, options, metadata).await
    }

    async fn remove(
        &self,
        resource: &Resource,
        targets: &[InstallTarget],
        options: &RemoveOptions,
    ) -> Result<()> {
        let roots = resolve_roots(self, targets)?;
        let siblings = sibling_roots(self, targets);
        self.store.remove(resource, &roots, &siblings, options).await
    }

    async fn list(&self, scope: ListScope) -> Result<ListResult> {
        Ok(self.store.list(self.locations(scope), Self::decode).await)
    }

    fn validate(&self, resource: &Resource) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Err(reason) = validate_resource_name(&resource.name) {
            errors.push(reason);
        }

        match resource.files.as_slice() {
            [file] => match serde_json::from_str::<HookDefinition>(&file.content) {
                Ok(definition) => {
                    if definition.command.trim().is_empty() {
                        errors.push("command must not be empty".to_string());
                    }
                    if let Some(tools) = &definition.tools
                        && tools.iter().any(|t| t.trim().is_empty())
                    {
                        errors.push("tools must not contain empty names".to_string());
                    }
                    if definition.description.is_none() {
                        warnings.push("hook has no description".to_string());
                    }
                }
                Err(err) => errors.push(format!("invalid hook body: {err}")),
            },
            [] => errors.push("hook has no body".to_string()),
            _ => errors.push("hook must consist of exactly one file".to_string()),
        }

        ValidationReport::from_parts(errors, warnings)
    }
}
