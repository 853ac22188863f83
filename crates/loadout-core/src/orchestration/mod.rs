//! Lifecycle flows wiring sources, handlers and the ledger together.
//!
//! Every flow runs strictly sequentially: one resource, one target at a
//! time. The ledger is updated after each completed target so that it always
//! describes what is on disk up to the last finished step.

pub mod add;
pub mod check;
pub mod list;
pub mod remove;
pub mod selector;
pub mod targets;
pub mod update;
pub mod validate;

use std::sync::Arc;

use crate::agent::AgentRegistry;
use crate::audit::SharedAuditSink;
use crate::config::LoadoutConfig;
use crate::context::AppContext;
use crate::error::Result;
use crate::handler::{HandlerEnv, ResourceHandler};
use crate::plugin::{HandlerRegistry, PluginManager, build_registry};
use crate::resource::ResourceType;
use crate::source::SourceResolver;

pub use add::{AddReport, AddRequest, InstalledItem};
pub use check::{CheckReport, Drift, DriftKind};
pub use list::{ListReport, ListRequest};
pub use remove::{RemoveReport, RemoveRequest};
pub use selector::{AcceptAll, Selector};
pub use targets::TargetRequest;
pub use update::{UpdateReport, UpdateRequest};
pub use validate::ValidatedResource;

/// Entry point for `add`, `remove`, `update`, `list`, `check` and `validate`.
#[derive(Debug, Clone)]
pub struct LifecycleService {
    ctx: AppContext,
    registry: HandlerRegistry,
    resolver: SourceResolver,
    agents: AgentRegistry,
}

impl LifecycleService {
    pub fn new(ctx: AppContext, registry: HandlerRegistry, resolver: SourceResolver) -> Self {
        Self {
            ctx,
            registry,
            resolver,
            agents: AgentRegistry::default(),
        }
    }

    /// Built-in handlers plus the configured plugins, with the default
    /// source resolver.
    pub fn bootstrap(
        ctx: AppContext,
        audit: SharedAuditSink,
        config: &LoadoutConfig,
    ) -> Result<(Self, PluginManager)> {
        let env = HandlerEnv::new(ctx.clone(), audit);
        let (registry, plugins) = build_registry(env, &config.plugins)?;
        let resolver = SourceResolver::new(ctx.clone());
        Ok((Self::new(ctx, registry, resolver), plugins))
    }

    pub fn with_agents(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    fn handler(&self, resource_type: &ResourceType) -> Result<Arc<dyn ResourceHandler>> {
        self.registry.require(resource_type)
    }

    /// The requested type, or every registered type.
    fn handlers_for(
        &self,
        resource_type: Option<&ResourceType>,
    ) -> Result<Vec<Arc<dyn ResourceHandler>>> {
        match resource_type {
            Some(t) => Ok(vec![self.handler(t)?]),
            None => Ok(self.registry.handlers().cloned().collect()),
        }
    }
}
