//! `validate`: discover resources in a source and check their shape.

use serde::Serialize;

use super::LifecycleService;
use crate::error::Result;
use crate::handler::DiscoverOptions;
use crate::resource::{Resource, ValidationReport};

#[derive(Debug, Clone, Serialize)]
pub struct ValidatedResource {
    pub resource: Resource,
    pub report: ValidationReport,
}

impl LifecycleService {
    /// Validate every resource found in `source` without installing anything.
    pub async fn validate_source(
        &self,
        source: &str,
        resource_type: Option<&crate::resource::ResourceType>,
    ) -> Result<Vec<ValidatedResource>> {
        let materialized = self.resolver.resolve(source).await?;
        let mut validated = Vec::new();
        for handler in self.handlers_for(resource_type)? {
            for resource in handler
                .discover(materialized.source(), &DiscoverOptions::default())
                .await?
            {
                let report = handler.validate(&resource);
                validated.push(ValidatedResource { resource, report });
            }
        }
        Ok(validated)
    }
}
