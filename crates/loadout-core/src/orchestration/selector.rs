//! Choosing a subset of discovered resources and detected agents.

use crate::agent::Agent;
use crate::error::Result;
use crate::resource::{Resource, ResourceType};

/// Narrows candidates before install. Frontends implement this with prompts.
pub trait Selector: Send + Sync {
    fn select_resources(&self, candidates: Vec<Resource>) -> Result<Vec<Resource>>;

    fn select_agents(
        &self,
        resource_type: &ResourceType,
        candidates: Vec<Agent>,
    ) -> Result<Vec<Agent>>;
}

/// Takes every candidate. Used for `--yes` and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Selector for AcceptAll {
    fn select_resources(&self, candidates: Vec<Resource>) -> Result<Vec<Resource>> {
        Ok(candidates)
    }

    fn select_agents(
        &self,
        _resource_type: &ResourceType,
        candidates: Vec<Agent>,
    ) -> Result<Vec<Agent>> {
        Ok(candidates)
    }
}
