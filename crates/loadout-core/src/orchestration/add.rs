//! `add`: resolve a source, discover resources and install them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::LifecycleService;
use super::selector::Selector;
use super::targets::TargetRequest;
use crate::error::{Error, Result};
use crate::handler::{DiscoverOptions, InstallOptions, ResourceHandler};
use crate::lockfile::Provenance;
use crate::resource::{InstallTarget, Installation, Resource, ResourceType};
use crate::source::ParsedSource;

#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub source: String,
    /// Limit discovery to one kind. `None` tries every registered kind.
    pub resource_type: Option<ResourceType>,
    /// Only these resource names. Empty means all discovered.
    pub names: Vec<String>,
    pub targets: TargetRequest,
    pub options: InstallOptions,
}

impl AddRequest {
    pub fn new(source: impl Into<String>, targets: TargetRequest) -> Self {
        Self {
            source: source.into(),
            targets,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn with_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }
}

/// One resource installed by `add`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledItem {
    pub resource_type: ResourceType,
    pub name: String,
    pub installations: Vec<Installation>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddReport {
    pub source: ParsedSource,
    pub installed: Vec<InstalledItem>,
}

impl LifecycleService {
    /// Install every selected resource from `request.source`.
    ///
    /// Resources are validated before anything is written. Targets are
    /// installed one at a time and each completed target is recorded in its
    /// scope's ledger immediately. The first failure stops the run; if some
    /// targets had already completed it is wrapped in `PartialInstall`.
    pub async fn add(&self, request: &AddRequest, selector: &dyn Selector) -> Result<AddReport> {
        let materialized = self.resolver.resolve(&request.source).await?;
        let parsed = materialized.source().clone();
        let provenance = Provenance::from_parsed(&parsed);

        let handlers = self.handlers_for(request.resource_type.as_ref())?;
        let discover = DiscoverOptions::named(request.names.iter().cloned());
        let mut candidates = Vec::new();
        for handler in &handlers {
            candidates.extend(handler.discover(&parsed, &discover).await?);
        }
        debug!(source = %parsed.original, count = candidates.len(), "discovered resources");

        for name in &request.names {
            if !candidates.iter().any(|r| &r.name == name) {
                return Err(Error::source_resolution(
                    &parsed.original,
                    format!("resource '{name}' not found in source"),
                ));
            }
        }
        if candidates.is_empty() {
            return Err(Error::source_resolution(
                &parsed.original,
                "no installable resources found",
            ));
        }

        let selected = selector.select_resources(candidates)?;
        let mut planned = Vec::with_capacity(selected.len());
        for resource in selected {
            let handler = self.handler(&resource.resource_type)?;
            let report = handler.validate(&resource);
            if !report.valid {
                return Err(Error::Validation {
                    resource_type: resource.resource_type.clone(),
                    name: resource.name.clone(),
                    errors: report.errors,
                });
            }
            planned.push((handler, resource, report.warnings));
        }

        let mut targets_by_type: HashMap<ResourceType, Vec<InstallTarget>> = HashMap::new();
        for (handler, resource, _) in &planned {
            if !targets_by_type.contains_key(&resource.resource_type) {
                let targets = self
                    .resolve_targets(handler.as_ref(), &request.targets, selector)
                    .await?;
                targets_by_type.insert(resource.resource_type.clone(), targets);
            }
        }

        let mut completed = Vec::new();
        let mut installed = Vec::new();
        for (handler, resource, warnings) in planned {
            let targets = targets_by_type
                .get(&resource.resource_type)
                .cloned()
                .unwrap_or_default();
            let installations = self
                .install_targets(
                    &handler,
                    &resource,
                    &targets,
                    &provenance,
                    &request.options,
                    &mut completed,
                )
                .await?;
            info!(
                resource_type = %resource.resource_type,
                name = %resource.name,
                targets = installations.len(),
                "installed"
            );
            installed.push(InstalledItem {
                resource_type: resource.resource_type.clone(),
                name: resource.name.clone(),
                installations,
                warnings,
            });
        }

        Ok(AddReport {
            source: parsed,
            installed,
        })
    }

    /// Install to each target in turn, recording each in the ledger.
    ///
    /// `completed` accumulates `type name -> agent/scope` labels across calls
    /// so a failure can report everything finished before it.
    pub(crate) async fn install_targets(
        &self,
        handler: &Arc<dyn ResourceHandler>,
        resource: &Resource,
        targets: &[InstallTarget],
        provenance: &Provenance,
        options: &InstallOptions,
        completed: &mut Vec<String>,
    ) -> Result<Vec<Installation>> {
        let extras = handler.ledger_extras(resource);
        let mut installations = Vec::with_capacity(targets.len());

        for target in targets {
            let step = async {
                let done = handler.install(resource, &[*target], options).await?;
                self.ctx
                    .lock_manager(target.scope)
                    .record_install(
                        &resource.resource_type,
                        &resource.name,
                        provenance,
                        &done,
                        extras.clone(),
                    )
                    .await?;
                Ok::<_, Error>(done)
            };
            match step.await {
                Ok(done) => {
                    completed.push(format!(
                        "{} {} -> {}",
                        resource.resource_type,
                        resource.name,
                        target.label()
                    ));
                    installations.extend(done);
                }
                Err(err) if completed.is_empty() => return Err(err),
                Err(err) => {
                    return Err(Error::PartialInstall {
                        completed: completed.clone(),
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(installations)
    }
}
