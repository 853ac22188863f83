//! Resource handlers: one implementation per resource-type tag.
//!
//! Handlers share a single contract ([`ResourceHandler`]) and are selected at
//! runtime through the [`crate::plugin::HandlerRegistry`]. File-backed kinds
//! delegate their I/O to [`files::FileStore`]; the MCP kind works on a shared
//! JSON document through [`document`].

pub mod document;
pub mod file_kind;
pub mod files;
pub mod hook;
pub mod mcp;
pub mod skill;
pub mod subagent;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::agent::Agent;
use crate::audit::SharedAuditSink;
use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::fs::path_occupied;
use crate::resource::{Installation, ListResult, Resource, ResourceType, ValidationReport};
use crate::source::ParsedSource;
use crate::types::{ListScope, Scope};

pub use file_kind::FileKindHandler;
pub use hook::{HookDefinition, HookHandler, HookType};
pub use mcp::McpHandler;
pub use skill::SkillHandler;
pub use subagent::SubagentHandler;

pub use crate::resource::InstallTarget;

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Only return resources with these names. Empty means all.
    pub names: Vec<String>,
}

impl DiscoverOptions {
    pub fn named(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Overwrite existing destinations instead of failing with a conflict.
    pub force: bool,
    /// Non-interactive confirmation. Handlers never prompt; frontends read it.
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Downgrade per-target failures to warnings and keep going.
    pub force: bool,
}

/// Contract implemented by every resource kind.
#[async_trait]
pub trait ResourceHandler: Send + Sync + std::fmt::Debug {
    fn resource_type(&self) -> ResourceType;

    fn supported_agents(&self) -> Vec<Agent>;

    /// Install root (directory, or document for document kinds).
    fn install_path(&self, agent: Agent, scope: Scope) -> Result<PathBuf>;

    /// Parse candidate resources from a materialized source.
    async fn discover(
        &self,
        source: &ParsedSource,
        options: &DiscoverOptions,
    ) -> Result<Vec<Resource>>;

    async fn install(
        &self,
        resource: &Resource,
        targets: &[InstallTarget],
        options: &InstallOptions,
    ) -> Result<Vec<Installation>>;

    async fn remove(
        &self,
        resource: &Resource,
        targets: &[InstallTarget],
        options: &RemoveOptions,
    ) -> Result<()>;

    /// What is on disk, merged by name. Never fails for missing locations.
    async fn list(&self, scope: ListScope) -> Result<ListResult>;

    fn validate(&self, resource: &Resource) -> ValidationReport;

    /// Kind-specific fields appended to the ledger entry.
    fn ledger_extras(&self, _resource: &Resource) -> Map<String, Value> {
        Map::new()
    }

    /// Whether a recorded installation is still present on disk.
    async fn is_installed(&self, _name: &str, installation: &Installation) -> Result<bool> {
        path_occupied(&installation.path).await
    }
}

/// State every built-in handler carries.
#[derive(Debug, Clone)]
pub struct HandlerEnv {
    pub ctx: AppContext,
    pub audit: SharedAuditSink,
}

impl HandlerEnv {
    pub fn new(ctx: AppContext, audit: SharedAuditSink) -> Self {
        Self { ctx, audit }
    }
}

/// Local directory of a materialized source.
pub(crate) fn source_dir(source: &ParsedSource) -> Result<&Path> {
    source.local_path.as_deref().ok_or_else(|| {
        Error::source_resolution(
            source.url.clone(),
            "source has not been materialized to a local directory",
        )
    })
}

/// Resolve the install root for every target up front.
pub(crate) fn resolve_roots(
    handler: &dyn ResourceHandler,
    targets: &[InstallTarget],
) -> Result<Vec<(InstallTarget, PathBuf)>> {
    targets
        .iter()
        .map(|t| Ok((*t, handler.install_path(t.agent, t.scope)?)))
        .collect()
}

/// Install roots of supported agents not named in `targets`, for the scopes
/// the targets touch.
pub(crate) fn sibling_roots(
    handler: &dyn ResourceHandler,
    targets: &[InstallTarget],
) -> Vec<(Scope, PathBuf)> {
    let mut siblings = Vec::new();
    for agent in handler.supported_agents() {
        for scope in [Scope::Project, Scope::Global] {
            let touched = targets.iter().any(|t| t.scope == scope);
            let removed = targets.iter().any(|t| t.scope == scope && t.agent == agent);
            if touched
                && !removed
                && let Ok(root) = handler.install_path(agent, scope)
            {
                siblings.push((scope, root));
            }
        }
    }
    siblings
}

pub(crate) fn unsupported(agent: Agent, resource_type: ResourceType) -> Error {
    Error::UnsupportedAgent {
        agent,
        resource_type,
    }
}

/// Turn a failed validation report into an error.
pub(crate) fn ensure_valid(resource: &Resource, report: ValidationReport) -> Result<()> {
    if report.valid {
        Ok(())
    } else {
        Err(Error::Validation {
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
            errors: report.errors,
        })
    }
}

/// Install root from the agent table, `UnsupportedAgent` outside it.
pub(crate) fn table_install_path(
    ctx: &AppContext,
    resource_type: &ResourceType,
    supported: &[Agent],
    agent: Agent,
    scope: Scope,
) -> Result<PathBuf> {
    if !supported.contains(&agent) {
        return Err(unsupported(agent, resource_type.clone()));
    }
    agent
        .spec()
        .install_path(ctx, resource_type, scope)
        .ok_or_else(|| unsupported(agent, resource_type.clone()))
}
