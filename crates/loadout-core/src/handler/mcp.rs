//! MCP servers: keyed entries under `mcpServers` in one JSON document per
//! (agent, scope). The key is the identity and its presence is the conflict
//! signal.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::document::{EditError, JsonDocument, edit_error, insert_entry, remove_entry};
use super::files::{discovery_candidates, stem_name};
use super::{
    DiscoverOptions, HandlerEnv, InstallOptions, RemoveOptions, ResourceHandler, ensure_valid,
    resolve_roots, source_dir, table_install_path,
};
use crate::agent::{Agent, AgentRegistry};
use crate::audit::{AuditAction, AuditEvent, AuditOutcome};
use crate::error::{Error, Result};
use crate::fs::validate_resource_name;
use crate::resource::{
    InstallTarget, Installation, ListResult, Resource, ResourceType, ValidationReport,
};
use crate::source::ParsedSource;
use crate::types::{ListScope, Scope};

pub const SERVERS_KEY: &str = "mcpServers";

const TRANSPORTS: &[&str] = &["stdio", "sse", "http", "streamable-http"];

#[derive(Debug, Clone)]
pub struct McpHandler {
    env: HandlerEnv,
    agents: Vec<Agent>,
}

impl McpHandler {
    pub fn new(env: HandlerEnv) -> Self {
        let agents = AgentRegistry::default().supporting(&ResourceType::Mcp);
        Self { env, agents }
    }

    /// Build a server resource; `server` is the entry stored under the key.
    pub fn resource(name: impl Into<String>, server: Map<String, Value>) -> Resource {
        let description = server
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        Resource {
            resource_type: ResourceType::Mcp,
            name: name.into(),
            description,
            metadata: server,
            files: Vec::new(),
        }
    }

    fn event(
        &self,
        action: AuditAction,
        outcome: AuditOutcome,
        name: &str,
        target: &InstallTarget,
        path: &Path,
    ) -> AuditEvent {
        AuditEvent::new(
            action,
            outcome,
            ResourceType::Mcp,
            name,
            target.agent,
            target.scope,
            path.to_path_buf(),
        )
    }

    async fn install_target(
        &self,
        resource: &Resource,
        target: &InstallTarget,
        document: &Path,
        options: &InstallOptions,
    ) -> Result<()> {
        let mut doc = JsonDocument::load(document).await?;
        let server = Value::Object(resource.metadata.clone());
        doc.apply(|root| insert_entry(root, &[SERVERS_KEY], &resource.name, server, options.force))
            .map_err(|err| match err {
                EditError::KeyExists => Error::Conflict {
                    resource_type: ResourceType::Mcp,
                    name: resource.name.clone(),
                    agent: target.agent,
                    scope: target.scope,
                    path: document.to_path_buf(),
                },
                other => edit_error(document, other),
            })?;
        doc.commit().await
    }

    async fn remove_target(&self, name: &str, document: &Path) -> Result<()> {
        let not_found = || Error::NotFound {
            resource_type: ResourceType::Mcp,
            name: name.to_string(),
            path: Some(document.to_path_buf()),
        };

        let mut doc = JsonDocument::load(document).await?;
        if !doc.existed() {
            return Err(not_found());
        }
        doc.apply(|root| remove_entry(root, &[SERVERS_KEY], name))
            .map_err(|err| match err {
                EditError::KeyMissing => not_found(),
                other => edit_error(document, other),
            })?;
        doc.commit().await
    }

    /// Servers found in one discovered JSON file.
    fn servers_in(path: &Path, raw: Map<String, Value>) -> Vec<(String, Map<String, Value>)> {
        if let Some(servers) = raw.get(SERVERS_KEY) {
            let Value::Object(servers) = servers else {
                debug!(path = %path.display(), "mcpServers is not an object");
                return Vec::new();
            };
            return servers
                .iter()
                .filter_map(|(name, value)| match value {
                    Value::Object(server) => Some((name.clone(), server.clone())),
                    _ => None,
                })
                .collect();
        }

        let looks_like_server = (raw.contains_key("command") || raw.contains_key("url"))
            && !raw.contains_key("hookType");
        match stem_name(path) {
            Some(name) if looks_like_server => vec![(name, raw)],
            _ => Vec::new(),
        }
    }
}

fn check_string_map(server: &Map<String, Value>, key: &str, errors: &mut Vec<String>) {
    match server.get(key) {
        None => {}
        Some(Value::Object(map)) if map.values().all(Value::is_string) => {}
        Some(_) => errors.push(format!("'{key}' must be an object of strings")),
    }
}

#[async_trait]
impl ResourceHandler for McpHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Mcp
    }

    fn supported_agents(&self) -> Vec<Agent> {
        self.agents.clone()
    }

    fn install_path(&self, agent: Agent, scope: Scope) -> Result<PathBuf> {
        table_install_path(&self.env.ctx, &ResourceType::Mcp, &self.agents, agent, scope)
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
                continue;
            };
            let Ok(Value::Object(raw)) = serde_json::from_str::<Value>(&content) else {
                continue;
            };
            for (name, server) in Self::servers_in(&path, raw) {
                if options.accepts(&name) && !found.iter().any(|r: &Resource| r.name == name) {
                    found.push(Self::resource(name, server));
                }
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
        let mut installed = Vec::with_capacity(roots.len());

        for (target, document) in &roots {
            match self.install_target(resource, target, document, options).await {
                Ok(()) => {
                    let mut metadata = Map::new();
                    metadata.insert(
                        "key".to_string(),
                        json!(format!("{SERVERS_KEY}.{}", resource.name)),
                    );
                    self.event(
                        AuditAction::Install,
                        AuditOutcome::Success,
                        &resource.name,
                        target,
                        document,
                    )
                    .with_metadata(metadata)
                    .emit(self.env.audit.as_ref());
                    installed.push(Installation::new(target.agent, target.scope, document.clone()));
                }
                Err(err) => {
                    self.event(
                        AuditAction::Install,
                        AuditOutcome::Failure,
                        &resource.name,
                        target,
                        document,
                    )
                    .with_message(err.to_string())
                    .emit(self.env.audit.as_ref());
                    return Err(err);
                }
            }
        }
        Ok(installed)
    }

    async fn remove(
        &self,
        resource: &Resource,
        targets: &[InstallTarget],
        options: &RemoveOptions,
    ) -> Result<()> {
        let roots = resolve_roots(self, targets)?;

        for (target, document) in &roots {
            match self.remove_target(&resource.name, document).await {
                Ok(()) => self
                    .event(
                        AuditAction::Remove,
                        AuditOutcome::Success,
                        &resource.name,
                        target,
                        document,
                    )
                    .emit(self.env.audit.as_ref()),
                Err(err) if options.force => {
                    warn!(
                        server = %resource.name,
                        path = %document.display(),
                        error = %err,
                        "remove failed, continuing because of --force"
                    );
                    self.event(
                        AuditAction::Remove,
                        AuditOutcome::Warning,
                        &resource.name,
                        target,
                        document,
                    )
                    .with_message(err.to_string())
                    .emit(self.env.audit.as_ref());
                }
                Err(err) => {
                    self.event(
                        AuditAction::Remove,
                        AuditOutcome::Failure,
                        &resource.name,
                        target,
                        document,
                    )
                    .with_message(err.to_string())
                    .emit(self.env.audit.as_ref());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn list(&self, scope: ListScope) -> Result<ListResult> {
        let mut result = ListResult::default();

        for agent in &self.agents {
            for scope in scope.scopes() {
                let Ok(document) = self.install_path(*agent, *scope) else {
                    continue;
                };
                let servers = match JsonDocument::load(&document).await {
                    Ok(doc) if !doc.existed() => continue,
                    Ok(doc) => doc.section(&[SERVERS_KEY]),
                    Err(err) => Err(err),
                };
                let servers = match servers {
                    Ok(servers) => servers,
                    Err(err) => {
                        result.push_error(*agent, *scope, err);
                        continue;
                    }
                };

                for (name, value) in servers {
                    match value {
                        Value::Object(server) => result.push(
                            Self::resource(name, server),
                            Installation::new(*agent, *scope, document.clone()),
                        ),
                        _ => result.push_error(
                            *agent,
                            *scope,
                            Error::parse(&document, format!("server '{name}' is not an object")),
                        ),
                    }
                }
            }
        }
        Ok(result)
    }

    fn validate(&self, resource: &Resource) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let server = &resource.metadata;

        if let Err(reason) = validate_resource_name(&resource.name) {
            errors.push(reason);
        }

        let command = server.get("command");
        let url = server.get("url");
        match (command, url) {
            (None, None) => errors.push("server needs a 'command' (stdio) or a 'url'".to_string()),
            (Some(_), Some(_)) => {
                warnings.push("server declares both 'command' and 'url'".to_string())
            }
            _ => {}
        }
        if let Some(command) = command
            && command.as_str().is_none_or(|c| c.trim().is_empty())
        {
            errors.push("'command' must be a non-empty string".to_string());
        }
        if let Some(url) = url {
            match url.as_str().map(url::Url::parse) {
                Some(Ok(parsed)) if matches!(parsed.scheme(), "http" | "https") => {}
                Some(Ok(parsed)) => {
                    errors.push(format!("unsupported url scheme '{}'", parsed.scheme()))
                }
                Some(Err(err)) => errors.push(format!("invalid url: {err}")),
                None => errors.push("'url' must be a string".to_string()),
            }
        }
        if let Some(transport) = server.get("type") {
            match transport.as_str() {
                Some(t) if TRANSPORTS.contains(&t) => {}
                _ => errors.push(format!(
                    "'type' must be one of: {}",
                    TRANSPORTS.join(", ")
                )),
            }
        }
        match server.get("args") {
            None => {}
            Some(Value::Array(args)) if args.iter().all(Value::is_string) => {}
            Some(_) => errors.push("'args' must be a list of strings".to_string()),
        }
        check_string_map(server, "env", &mut errors);
        check_string_map(server, "headers", &mut errors);

        ValidationReport::from_parts(errors, warnings)
    }

    async fn is_installed(&self, name: &str, installation: &Installation) -> Result<bool> {
        let doc = JsonDocument::load(&installation.path).await?;
        Ok(doc.existed() && doc.section(&[SERVERS_KEY])?.contains_key(name))
    }
}
