//! Install target derivation.

use tracing::debug;

use super::LifecycleService;
use super::selector::Selector;
use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::fs::InstallMode;
use crate::handler::ResourceHandler;
use crate::resource::InstallTarget;
use crate::types::Scope;

/// Where the caller wants resources to go.
#[derive(Debug, Clone, Default)]
pub struct TargetRequest {
    /// Explicit agents. Empty means every detected agent the handler supports.
    pub agents: Vec<Agent>,
    /// Configured defaults, used only when no agent is explicit. Agents the
    /// handler does not support are skipped instead of rejected.
    pub preferred: Vec<Agent>,
    pub scope: Scope,
    pub mode: InstallMode,
}

impl TargetRequest {
    pub fn new(scope: Scope) -> Self {
        Self {
            agents: Vec::new(),
            preferred: Vec::new(),
            scope,
            mode: InstallMode::default(),
        }
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents = agents.into_iter().collect();
        self
    }

    pub fn with_preferred(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.preferred = agents.into_iter().collect();
        self
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }
}

impl LifecycleService {
    /// Expand a request into concrete targets for one handler.
    ///
    /// Explicit agents must be supported by the handler. Otherwise the
    /// supported preferred agents are used, and when none of those apply the
    /// detected supported agents are offered to `selector`.
    pub async fn resolve_targets(
        &self,
        handler: &dyn ResourceHandler,
        request: &TargetRequest,
        selector: &dyn Selector,
    ) -> Result<Vec<InstallTarget>> {
        let resource_type = handler.resource_type();
        let supported = handler.supported_agents();

        let preferred: Vec<Agent> = request
            .preferred
            .iter()
            .copied()
            .filter(|agent| supported.contains(agent))
            .collect();

        let agents = if !request.agents.is_empty() {
            for agent in &request.agents {
                if !supported.contains(agent) {
                    return Err(Error::UnsupportedAgent {
                        agent: *agent,
                        resource_type,
                    });
                }
            }
            request.agents.clone()
        } else if !preferred.is_empty() {
            preferred
        } else {
            let detected = self.agents.detected(&self.ctx, &supported).await;
            if detected.is_empty() {
                return Err(Error::NoTargets {
                    resource_type,
                    reason: format!(
                        "no supported agent detected (supported: {}); pass --agent",
                        join_ids(&supported)
                    ),
                });
            }
            selector.select_agents(&resource_type, detected)?
        };

        if agents.is_empty() {
            return Err(Error::NoTargets {
                resource_type,
                reason: "no agent selected".to_string(),
            });
        }
        debug!(
            resource_type = %resource_type,
            agents = %join_ids(&agents),
            scope = %request.scope,
            "resolved install targets"
        );
        Ok(agents
            .into_iter()
            .map(|agent| InstallTarget::new(agent, request.scope, request.mode))
            .collect())
    }
}

fn join_ids(agents: &[Agent]) -> String {
    agents.iter().map(|a| a.id()).collect::<Vec<_>>().join(", ")
}
