//! Subagent definitions: one markdown file with YAML frontmatter per agent.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::files::{EntryShape, FileStore, discovery_candidates};
use super::{
    DiscoverOptions, HandlerEnv, InstallOptions, RemoveOptions, ResourceHandler, ensure_valid,
    resolve_roots, sibling_roots, source_dir, table_install_path,
};
use crate::agent::{Agent, AgentRegistry};
use crate::error::{Error, Result};
use crate::fs::{hash_bytes, validate_resource_name};
use crate::resource::frontmatter;
use crate::resource::{
    InstallTarget, Installation, ListResult, Resource, ResourceFile, ResourceType,
    ValidationReport,
};
use crate::source::ParsedSource;
use crate::types::{ListScope, Scope};

/// Ledger `format` value for subagent entries.
pub const SUBAGENT_FORMAT: &str = "markdown";

#[derive(Debug, Clone)]
pub struct SubagentHandler {
    store: FileStore,
    agents: Vec<Agent>,
}

impl SubagentHandler {
    pub fn new(env: HandlerEnv) -> Self {
        let agents = AgentRegistry::default().supporting(&ResourceType::Subagent);
        Self {
            store: FileStore::new(
                env,
                ResourceType::Subagent,
                EntryShape::File {
                    extension: "md".to_string(),
                },
            ),
            agents,
        }
    }

    /// Build a subagent resource from a markdown document.
    ///
    /// The name comes from the frontmatter when present, else `fallback_name`.
    pub fn from_markdown(
        fallback_name: &str,
        content: String,
        path: &Path,
    ) -> Result<Resource> {
        let metadata = frontmatter::parse(&content)
            .map_err(|e| Error::parse(path, e))?
            .ok_or_else(|| Error::parse(path, "missing YAML frontmatter"))?;
        let name = frontmatter::string_field(&metadata, "name")
            .unwrap_or_else(|| fallback_name.to_string());

        Ok(Resource {
            resource_type: ResourceType::Subagent,
            description: frontmatter::string_field(&metadata, "description"),
            files: vec![ResourceFile::new(format!("{name}.md"), content)],
            metadata,
            name,
        })
    }

    fn decode(name: &str, files: Vec<ResourceFile>, path: &Path) -> Result<Resource> {
        let content = files.into_iter().next().map(|f| f.content).unwrap_or_default();
        let mut resource = Self::from_markdown(name, content, path)?;
        // The file name is the installed identity.
        resource.name = name.to_string();
        Ok(resource)
    }

    fn locations(&self, scope: ListScope) -> Vec<(Agent, Scope, PathBuf)> {
        self.agents
            .iter()
            .flat_map(|agent| scope.scopes().iter().map(move |s| (*agent, *s)))
            .filter_map(|(agent, scope)| {
                self.install_path(agent, scope)
                    .ok()
                    .map(|root| (agent, scope, root))
            })
            .collect()
    }
}

fn check_string_list(metadata: &Map<String, Value>, key: &str, errors: &mut Vec<String>) {
    match metadata.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
        Some(_) => errors.push(format!("'{key}' must be a string or a list of strings")),
    }
}

#[async_trait]
impl ResourceHandler for SubagentHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Subagent
    }

    fn supported_agents(&self) -> Vec<Agent> {
        self.agents.clone()
    }

    fn install_path(&self, agent: Agent, scope: Scope) -> Result<PathBuf> {
        table_install_path(
            &self.store.env().ctx,
            &ResourceType::Subagent,
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
        let candidates = discovery_candidates(root).await?;
        let skills = skill_dirs(&candidates);
        let mut found = Vec::new();

        for path in candidates {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.ends_with(".md") || file_name.eq_ignore_ascii_case("SKILL.md") {
                continue;
            }
            // Documents bundled with a skill belong to the skill.
            if skills.iter().any(|dir| path.starts_with(dir)) {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                debug!(path = %path.display(), "skipping unreadable file");
                continue;
            };
            let stem = file_name.trim_end_matches(".md");
            match Self::from_markdown(stem, content, &path) {
                Ok(resource) if resource.metadata.contains_key("name") => {
                    if options.accepts(&resource.name) {
                        found.push(resource);
                    }
                }
                _ => debug!(path = %path.display(), "not a subagent definition"),
            }
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
        self.store
            .install(resource, &roots, options, self.ledger_extras(resource))
            .await
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

        let [file] = resource.files.as_slice() else {
            errors.push("subagent must consist of exactly one markdown file".to_string());
            return ValidationReport::from_parts(errors, warnings);
        };

        match frontmatter::parse(&file.content) {
            Ok(Some(meta)) => {
                match frontmatter::string_field(&meta, "name") {
                    None => errors.push("frontmatter is missing 'name'".to_string()),
                    Some(name) if name != resource.name => warnings.push(format!(
                        "frontmatter name '{name}' differs from resource name '{}'",
                        resource.name
                    )),
                    Some(_) => {}
                }
                if frontmatter::string_field(&meta, "description").is_none() {
                    errors.push("frontmatter is missing 'description'".to_string());
                }
                check_string_list(&meta, "tools", &mut errors);
                if let Some(model) = meta.get("model")
                    && !model.is_string()
                {
                    errors.push("'model' must be a string".to_string());
                }
            }
            Ok(None) => errors.push("missing YAML frontmatter".to_string()),
            Err(err) => errors.push(format!("invalid frontmatter: {err}")),
        }

        if frontmatter::split(&file.content)
            .map(|(_, body)| body.trim().is_empty())
            .unwrap_or(false)
        {
            warnings.push("subagent has an empty prompt body".to_string());
        }

        ValidationReport::from_parts(errors, warnings)
    }

    fn ledger_extras(&self, resource: &Resource) -> Map<String, Value> {
        let content = resource
            .files
            .first()
            .map(|f| f.content.as_bytes())
            .unwrap_or_default();
        let mut extras = Map::new();
        extras.insert("format".to_string(), json!(SUBAGENT_FORMAT));
        extras.insert("contentHash".to_string(), json!(hash_bytes(content)));
        extras
    }
}

/// Directories holding a `SKILL.md`.
fn skill_dirs(files: &[PathBuf]) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case("SKILL.md"))
        })
        .filter_map(|path| path.parent().map(Path::to_path_buf))
        .collect()
}
