//! Agent registry: lookups and environment detection.
//!
//! The registry is the central place to discover and filter agents based on
//! the resource kinds they support and whether they are present on disk.

use std::path::PathBuf;

use crate::context::AppContext;
use crate::resource::ResourceType;
use crate::types::Scope;

use super::{Agent, AgentSpec};

/// Registry of known agents.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::with_default_agents()
    }
}

impl AgentRegistry {
    /// Create a registry with every built-in agent.
    pub fn with_default_agents() -> Self {
        Self {
            agents: Agent::ALL.to_vec(),
        }
    }

    /// Create a registry limited to the given agents.
    pub fn with_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        let mut agents: Vec<Agent> = agents.into_iter().collect();
        agents.sort();
        agents.dedup();
        Self { agents }
    }

    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    /// Look up an agent by id or alias.
    pub fn get(&self, id: &str) -> Option<&'static AgentSpec> {
        let agent: Agent = id.parse().ok()?;
        self.agents.contains(&agent).then(|| agent.spec())
    }

    /// Agents with a layout for a built-in kind.
    pub fn supporting(&self, resource_type: &ResourceType) -> Vec<Agent> {
        self.agents
            .iter()
            .copied()
            .filter(|a| a.spec().layout(resource_type).is_some())
            .collect()
    }

    /// Install location for an agent/kind/scope, `None` if unsupported.
    pub fn install_path(
        &self,
        ctx: &AppContext,
        agent: Agent,
        resource_type: &ResourceType,
        scope: Scope,
    ) -> Option<PathBuf> {
        if !self.agents.contains(&agent) {
            return None;
        }
        agent.spec().install_path(ctx, resource_type, scope)
    }

    /// Whether the agent's config directory exists in either scope.
    pub async fn is_detected(&self, ctx: &AppContext, agent: Agent) -> bool {
        for path in agent.spec().detection_paths(ctx) {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    /// Detected agents among `candidates`, in registry order.
    pub async fn detected(&self, ctx: &AppContext, candidates: &[Agent]) -> Vec<Agent> {
        let mut found = Vec::new();
        for agent in &self.agents {
            if candidates.contains(agent) && self.is_detected(ctx, *agent).await {
                found.push(*agent);
            }
        }
        found
    }

    /// List all agent ids.
    pub fn agent_ids(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_agents_registered() {
        let registry = AgentRegistry::with_default_agents();
        let ids = registry.agent_ids();

        assert!(ids.contains(&"claude-code"));
        assert!(ids.contains(&"cursor"));
        assert!(ids.contains(&"roo"));
        assert!(ids.contains(&"codex"));
        assert!(ids.contains(&"opencode"));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn hook_capable_agents() {
        let registry = AgentRegistry::default();
        let agents = registry.supporting(&ResourceType::Hook);
        assert_eq!(agents, vec![Agent::ClaudeCode, Agent::Cursor]);
    }

    #[test]
    fn mcp_capable_agents() {
        let registry = AgentRegistry::default();
        let agents = registry.supporting(&ResourceType::Mcp);
        assert_eq!(agents, vec![Agent::ClaudeCode, Agent::Cursor, Agent::Roo]);
    }

    #[test]
    fn restricted_registry_hides_other_agents() {
        let registry = AgentRegistry::with_agents([Agent::Roo, Agent::Roo]);
        assert_eq!(registry.all(), &[Agent::Roo]);
        assert!(registry.get("claude-code").is_none());
        assert!(registry.get("roo").is_some());
    }

    #[tokio::test]
    async fn detection_checks_project_and_home() {
        let temp = tempfile::tempdir().expect("tempdir should succeed");
        let home = temp.path().join("home");
        let project = temp.path().join("project");
        std::fs::create_dir_all(home.join(".cursor")).expect("create home agent dir");
        std::fs::create_dir_all(project.join(".claude")).expect("create project agent dir");

        let ctx = AppContext::new(home, project);
        let registry = AgentRegistry::default();

        let detected = registry.detected(&ctx, &Agent::ALL).await;
        assert_eq!(detected, vec![Agent::ClaudeCode, Agent::Cursor]);
        assert!(!registry.is_detected(&ctx, Agent::Roo).await);
    }
}
