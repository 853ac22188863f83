//! Skills: a directory per skill holding `SKILL.md` plus auxiliary files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, json};
use tracing::debug;

use super::files::{EntryShape, FileStore, discovery_candidates, read_tree};
use super::{
    DiscoverOptions, HandlerEnv, InstallOptions, RemoveOptions, ResourceHandler, ensure_valid,
    resolve_roots, sibling_roots, source_dir, table_install_path,
};
use crate::agent::{Agent, AgentRegistry};
use crate::error::{Error, Result};
use crate::fs::validate_resource_name;
use crate::resource::frontmatter;
use crate::resource::{
    InstallTarget, Installation, ListResult, Resource, ResourceFile, ResourceType,
    ValidationReport,
};
use crate::source::ParsedSource;
use crate::types::{ListScope, Scope};

pub const SKILL_MANIFEST: &str = "SKILL.md";

#[derive(Debug, Clone)]
pub struct SkillHandler {
    store: FileStore,
    agents: Vec<Agent>,
}

impl SkillHandler {
    pub fn new(env: HandlerEnv) -> Self {
        let agents = AgentRegistry::default().supporting(&ResourceType::Skill);
        Self {
            store: FileStore::new(
                env,
                ResourceType::Skill,
                EntryShape::Directory {
                    marker: SKILL_MANIFEST.to_string(),
                },
            ),
            agents,
        }
    }

    /// Build a skill from its files. `SKILL.md` must be among them.
    pub fn from_files(dir_name: &str, files: Vec<ResourceFile>, path: &Path) -> Result<Resource> {
        let manifest = files
            .iter()
            .find(|f| f.path == SKILL_MANIFEST)
            .ok_or_else(|| Error::parse(path, format!("missing {SKILL_MANIFEST}")))?;
        let metadata = frontmatter::parse(&manifest.content)
            .map_err(|e| Error::parse(path.join(SKILL_MANIFEST), e))?
            .unwrap_or_default();

        Ok(Resource {
            resource_type: ResourceType::Skill,
            name: frontmatter::string_field(&metadata, "name")
                .unwrap_or_else(|| dir_name.to_string()),
            description: frontmatter::string_field(&metadata, "description"),
            metadata,
            files,
        })
    }

    fn decode(name: &str, files: Vec<ResourceFile>, path: &Path) -> Result<Resource> {
        let mut resource = Self::from_files(name, files, path)?;
        resource.name = name.to_string();
        Ok(resource)
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
impl ResourceHandler for SkillHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Skill
    }

    fn supported_agents(&self) -> Vec<Agent> {
        self.agents.clone()
    }

    fn install_path(&self, agent: Agent, scope: Scope) -> Result<PathBuf> {
        table_install_path(
            &self.store.env().ctx,
            &ResourceType::Skill,
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
        let skill_dirs: BTreeSet<PathBuf> = discovery_candidates(root)
            .await?
            .into_iter()
            .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some(SKILL_MANIFEST))
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();

        let mut found = Vec::new();
        for dir in skill_dirs {
            let dir_name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("skill")
                .to_string();
            let files = match read_tree(&dir).await {
                Ok(files) => files,
                Err(err) => {
                    debug!(path = %dir.display(), error = %err, "skipping unreadable skill");
                    continue;
                }
            };
            match Self::from_files(&dir_name, files, &dir) {
                Ok(resource) if options.accepts(&resource.name) => found.push(resource),
                Ok(_) => {}
                Err(err) => debug!(path = %dir.display(), error = %err, "not a skill"),
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
        let mut metadata = Map::new();
        metadata.insert("fileCount".to_string(), json!(resource.files.len()));
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

        match resource.file(SKILL_MANIFEST) {
            None => errors.push(format!("skill has no {SKILL_MANIFEST}")),
            Some(content) => match frontmatter::parse(content) {
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
                }
                Ok(None) => errors.push(format!("{SKILL_MANIFEST} has no YAML frontmatter")),
                Err(err) => errors.push(format!("invalid frontmatter: {err}")),
            },
        }

        ValidationReport::from_parts(errors, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_name_prefers_frontmatter() {
        let files = vec![
            ResourceFile::new("SKILL.md", "---\nname: pdf\ndescription: PDFs\n---\nbody"),
            ResourceFile::new("scripts/extract.py", "print()"),
        ];
        let resource =
            SkillHandler::from_files("pdf-dir", files, Path::new("/src/pdf-dir")).expect("parse");
        assert_eq!(resource.name, "pdf");
        assert_eq!(resource.files.len(), 2);
    }

    #[test]
    fn missing_manifest_is_parse_error() {
        let files = vec![ResourceFile::new("README.md", "hi")];
        let err =
            SkillHandler::from_files("x", files, Path::new("/src/x")).expect_err("no manifest");
        assert!(matches!(err, Error::Parse { .. }));
    }
}
