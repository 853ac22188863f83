//! `list`: disk state merged with ledger provenance.

use serde::Serialize;

use super::LifecycleService;
use crate::error::Result;
use crate::lockfile::LockEntry;
use crate::resource::{ListResult, ResourceType};
use crate::types::ListScope;

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub resource_type: Option<ResourceType>,
    pub scope: ListScope,
}

impl ListRequest {
    pub fn new(scope: ListScope) -> Self {
        Self {
            resource_type: None,
            scope,
        }
    }

    pub fn with_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }
}

/// One section per resource type, in registry order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListReport {
    pub sections: Vec<(ResourceType, ListResult)>,
}

impl ListReport {
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|(_, result)| result.is_empty())
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<&ListResult> {
        self.sections
            .iter()
            .find(|(t, _)| t == resource_type)
            .map(|(_, result)| result)
    }
}

impl LifecycleService {
    /// What is installed on disk, annotated with where it came from.
    ///
    /// Disk is authoritative for presence; the ledger only contributes
    /// provenance. Resources placed by hand appear without a source.
    pub async fn list(&self, request: &ListRequest) -> Result<ListReport> {
        let mut ledger: Vec<LockEntry> = Vec::new();
        for scope in request.scope.scopes() {
            ledger.extend(
                self.ctx
                    .lock_manager(*scope)
                    .entries(request.resource_type.as_ref())
                    .await?,
            );
        }

        let mut report = ListReport::default();
        for handler in self.handlers_for(request.resource_type.as_ref())? {
            let resource_type = handler.resource_type();
            let mut result = handler.list(request.scope).await?;
            for installed in &mut result.resources {
                let recorded = ledger.iter().find(|entry| {
                    entry.resource_type == resource_type
                        && entry.name == installed.resource.name
                        && entry.installed_for.iter().any(|recorded| {
                            installed.installed_for.iter().any(|found| {
                                found.agent == recorded.agent && found.scope == recorded.scope
                            })
                        })
                });
                if let Some(entry) = recorded {
                    installed.source = Some(entry.source.clone());
                    installed.source_type = Some(entry.source_type.to_string());
                    installed.source_url = entry.source_url.clone();
                    installed.installed_at = Some(entry.installed_at);
                    installed.updated_at = Some(entry.updated_at);
                }
            }
            report.sections.push((resource_type, result));
        }
        Ok(report)
    }
}
