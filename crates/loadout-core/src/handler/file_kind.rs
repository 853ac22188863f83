//! Generic one-file-per-resource kind, configured by a plugin descriptor.
//!
//! Each agent stores the kind in `<agent config dir>/<directory>/<name>.<extension>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::files::{EntryShape, FileStore, discovery_candidates, stem_name};
use super::{
    DiscoverOptions, HandlerEnv, InstallOptions, RemoveOptions, ResourceHandler, ensure_valid,
    resolve_roots, sibling_roots, source_dir, unsupported,
};
use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::fs::validate_resource_name;
use crate::resource::frontmatter;
use crate::resource::{
    InstallTarget, Installation, ListResult, Resource, ResourceFile, ResourceType,
    ValidationReport,
};
use crate::source::ParsedSource;
use crate::types::{ListScope, Scope};

/// Settings a plugin passes for a file kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileKindOptions {
    /// File extension without the dot.
    pub extension: String,
    /// Directory name inside each agent's config directory.
    pub directory: String,
}

impl FileKindOptions {
    /// Read `extension`/`directory` from descriptor options.
    ///
    /// `directory` defaults to the plural of the type tag.
    pub fn from_options(
        resource_type: &ResourceType,
        options: &Map<String, Value>,
    ) -> Result<Self> {
        let field = |key: &str| {
            options
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
        };
        let extension = field("extension").ok_or_else(|| Error::Plugin {
            id: resource_type.to_string(),
            reason: "file-kind plugins need an 'extension' option".to_string(),
        })?;
        let directory = field("directory").unwrap_or_else(|| format!("{resource_type}s"));

        for (key, value) in [("extension", &extension), ("directory", &directory)] {
            validate_resource_name(value).map_err(|reason| Error::Plugin {
                id: resource_type.to_string(),
                reason: format!("invalid {key} '{value}': {reason}"),
            })?;
        }
        Ok(Self {
            extension,
            directory,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FileKindHandler {
    resource_type: ResourceType,
    options: FileKindOptions,
    agents: Vec<Agent>,
    store: FileStore,
}

impl FileKindHandler {
    pub fn new(
        env: HandlerEnv,
        resource_type: ResourceType,
        agents: Vec<Agent>,
        options: FileKindOptions,
    ) -> Self {
        let store = FileStore::new(
            env,
            resource_type.clone(),
            EntryShape::File {
                extension: options.extension.clone(),
            },
        );
        Self {
            resource_type,
            options,
            agents,
            store,
        }
    }

    pub fn options(&self) -> &FileKindOptions {
        &self.options
    }

    /// Build a resource from one file's content.
    pub fn resource(&self, name: &str, content: String) -> Resource {
        let metadata = if self.options.extension == "md" {
            frontmatter::parse(&content).ok().flatten().unwrap_or_default()
        } else {
            Map::new()
        };
        Resource {
            resource_type: self.resource_type.clone(),
            name: name.to_string(),
            description: frontmatter::string_field(&metadata, "description"),
            files: vec![ResourceFile::new(
                format!("{name}.{}", self.options.extension),
                content,
            )],
            metadata,
        }
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
impl ResourceHandler for FileKindHandler {
    fn resource_type(&self) -> ResourceType {
        self.resource_type.clone()
    }

    fn supported_agents(&self) -> Vec<Agent> {
        self.agents.clone()
    }

    fn install_path(&self, agent: Agent, scope: Scope) -> Result<PathBuf> {
        if !self.agents.contains(&agent) {
            return Err(unsupported(agent, self.resource_type.clone()));
        }
        Ok(agent
            .spec()
            .config_dir(&self.store.env().ctx, scope)
            .join(&self.options.directory))
    }

    async fn discover(
        &self,
        source: &ParsedSource,
        options: &DiscoverOptions,
    ) -> Result<Vec<Resource>> {
        let root = source_dir(source)?;
        let mut found = Vec::new();
        for path in discovery_candidates(root).await? {
            if path.extension().and_then(|e| e.to_str()) != Some(self.options.extension.as_str()) {
                continue;
            }
            let Some(name) = stem_name(&path) else { continue };
            if !options.accepts(&name) {
                continue;
            }
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                found.push(self.resource(&name, content));
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
        self.store.install(resource, &roots, options, Map::new()).await
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
        let decode = |name: &str, files: Vec<ResourceFile>, _path: &Path| -> Result<Resource> {
            let content = files.into_iter().next().map(|f| f.content).unwrap_or_default();
            Ok(self.resource(name, content))
        };
        Ok(self.store.list(self.locations(scope), decode).await)
    }

    fn validate(&self, resource: &Resource) -> ValidationReport {
        let mut errors = Vec::new();
        if let Err(reason) = validate_resource_name(&resource.name) {
            errors.push(reason);
        }
        match resource.files.as_slice() {
            [file] if file.content.trim().is_empty() => errors.push("file is empty".to_string()),
            [file] if self.options.extension == "json" => {
                if let Err(err) = serde_json::from_str::<Value>(&file.content) {
                    errors.push(format!("invalid JSON: {err}"));
                }
            }
            [_] => {}
            _ => errors.push("resource must consist of exactly one file".to_string()),
        }
        ValidationReport::from_parts(errors, Vec::new())
    }
}
