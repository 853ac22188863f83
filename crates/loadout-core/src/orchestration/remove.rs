//! `remove`: delete an installed resource, driven by the ledger.

use serde::Serialize;
use tracing::{debug, info};

use super::LifecycleService;
use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::fs::InstallMode;
use crate::handler::RemoveOptions;
use crate::lockfile::LockEntry;
use crate::resource::{InstallTarget, Resource, ResourceType};
use crate::types::{ListScope, Scope};

#[derive(Debug, Clone)]
pub struct RemoveRequest {
    pub resource_type: ResourceType,
    pub name: String,
    pub scope: Scope,
    /// Restrict removal to these agents. Empty means every recorded one.
    pub agents: Vec<Agent>,
    pub options: RemoveOptions,
}

impl RemoveRequest {
    pub fn new(resource_type: ResourceType, name: impl Into<String>, scope: Scope) -> Self {
        Self {
            resource_type,
            name: name.into(),
            scope,
            agents: Vec::new(),
            options: RemoveOptions::default(),
        }
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents = agents.into_iter().collect();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.options.force = force;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveReport {
    pub removed: Vec<InstallTarget>,
    /// What the ledger still records for the resource in this scope.
    pub remaining: Option<LockEntry>,
}

impl LifecycleService {
    /// Remove a resource from its targets in one scope.
    ///
    /// Targets come from the ledger. A resource the ledger does not know is
    /// looked up on disk instead, so hand-placed files can still be removed.
    /// Each removed target is dropped from the ledger as soon as it is gone.
    pub async fn remove(&self, request: &RemoveRequest) -> Result<RemoveReport> {
        let handler = self.handler(&request.resource_type)?;
        let lock = self.ctx.lock_manager(request.scope);
        let entry = lock.get(&request.resource_type, &request.name).await?;

        let targets = match &entry {
            Some(entry) => self.recorded_targets(entry, request),
            None => self.disk_targets(request).await?,
        };
        if targets.is_empty() {
            return Err(Error::NotFound {
                resource_type: request.resource_type.clone(),
                name: request.name.clone(),
                path: None,
            });
        }

        let resource = Resource::new(request.resource_type.clone(), &request.name);
        let mut removed = Vec::with_capacity(targets.len());
        let mut remaining = entry;
        for target in targets {
            handler
                .remove(&resource, &[target], &request.options)
                .await?;
            remaining = lock
                .record_removal(
                    &request.resource_type,
                    &request.name,
                    &[(target.agent, target.scope)],
                )
                .await?;
            debug!(name = %request.name, target = %target.label(), "removed");
            removed.push(target);
        }

        info!(
            resource_type = %request.resource_type,
            name = %request.name,
            targets = removed.len(),
            "removed"
        );
        Ok(RemoveReport { removed, remaining })
    }

    fn recorded_targets(&self, entry: &LockEntry, request: &RemoveRequest) -> Vec<InstallTarget> {
        let mut targets: Vec<InstallTarget> = Vec::new();
        for installation in &entry.installed_for {
            if installation.scope != request.scope
                || (!request.agents.is_empty() && !request.agents.contains(&installation.agent))
            {
                continue;
            }
            if targets.iter().any(|t| t.agent == installation.agent) {
                continue;
            }
            targets.push(InstallTarget::new(
                installation.agent,
                installation.scope,
                installation.mode.unwrap_or_default(),
            ));
        }
        targets
    }

    /// Untracked resource: explicit agents, else wherever `list` finds it.
    async fn disk_targets(&self, request: &RemoveRequest) -> Result<Vec<InstallTarget>> {
        if !request.agents.is_empty() {
            return Ok(request
                .agents
                .iter()
                .map(|agent| InstallTarget::new(*agent, request.scope, InstallMode::default()))
                .collect());
        }

        let handler = self.handler(&request.resource_type)?;
        let listed = handler.list(ListScope::from(request.scope)).await?;
        Ok(listed
            .get(&request.name)
            .map(|found| {
                found
                    .installed_for
                    .iter()
                    .filter(|i| i.scope == request.scope)
                    .map(|i| InstallTarget::new(i.agent, i.scope, i.mode.unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
