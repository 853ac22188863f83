//! `update`: reinstall a resource from its recorded source.

use serde::Serialize;
use tracing::info;

use super::LifecycleService;
use crate::error::{Error, Result};
use crate::handler::{DiscoverOptions, InstallOptions};
use crate::lockfile::{LockEntry, Provenance};
use crate::resource::{InstallTarget, ResourceType};
use crate::types::ListScope;

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub resource_type: ResourceType,
    pub name: String,
    pub scope: ListScope,
}

impl UpdateRequest {
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
            scope: ListScope::Both,
        }
    }

    pub fn with_scope(mut self, scope: ListScope) -> Self {
        self.scope = scope;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    /// Refreshed ledger entries, one per scope that tracked the resource.
    pub entries: Vec<LockEntry>,
}

impl LifecycleService {
    /// Re-resolve the recorded source, rediscover the resource and
    /// force-install it to every recorded installation.
    pub async fn update(&self, request: &UpdateRequest) -> Result<UpdateReport> {
        let handler = self.handler(&request.resource_type)?;

        let mut tracked = Vec::new();
        for scope in request.scope.scopes() {
            if let Some(entry) = self
                .ctx
                .lock_manager(*scope)
                .get(&request.resource_type, &request.name)
                .await?
            {
                tracked.push((*scope, entry));
            }
        }
        if tracked.is_empty() {
            return Err(Error::NotFound {
                resource_type: request.resource_type.clone(),
                name: request.name.clone(),
                path: None,
            });
        }

        let options = InstallOptions {
            force: true,
            yes: true,
        };
        let mut completed = Vec::new();
        let mut entries = Vec::with_capacity(tracked.len());
        for (scope, entry) in tracked {
            let materialized = self.resolver.resolve(&entry.recorded_source()).await?;
            let parsed = materialized.source();
            let resource = handler
                .discover(parsed, &DiscoverOptions::named([request.name.as_str()]))
                .await?
                .into_iter()
                .find(|r| r.name == request.name)
                .ok_or_else(|| Error::NotFound {
                    resource_type: request.resource_type.clone(),
                    name: request.name.clone(),
                    path: parsed.local_path.clone(),
                })?;

            let report = handler.validate(&resource);
            if !report.valid {
                return Err(Error::Validation {
                    resource_type: resource.resource_type.clone(),
                    name: resource.name.clone(),
                    errors: report.errors,
                });
            }

            let mut targets: Vec<InstallTarget> = Vec::new();
            for i in &entry.installed_for {
                if !targets.iter().any(|t| t.agent == i.agent && t.scope == i.scope) {
                    targets.push(InstallTarget::new(i.agent, i.scope, i.mode.unwrap_or_default()));
                }
            }

            let provenance = Provenance {
                source: entry.source.clone(),
                ..Provenance::from_parsed(parsed)
            };
            self.install_targets(
                &handler,
                &resource,
                &targets,
                &provenance,
                &options,
                &mut completed,
            )
            .await?;

            if let Some(refreshed) = self
                .ctx
                .lock_manager(scope)
                .get(&request.resource_type, &request.name)
                .await?
            {
                entries.push(refreshed);
            }
        }

        info!(
            resource_type = %request.resource_type,
            name = %request.name,
            "updated"
        );
        Ok(UpdateReport { entries })
    }
}
