//! Handler dispatch and third-party resource kinds.
//!
//! The [`HandlerRegistry`] maps a resource-type tag to the handler serving it.
//! Built-in kinds are registered up front; plugin kinds are added and removed
//! through the [`PluginManager`].

pub mod builtin;
pub mod manager;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handler::{
    HandlerEnv, HookHandler, McpHandler, ResourceHandler, SkillHandler, SubagentHandler,
};
use crate::resource::ResourceType;

pub use builtin::{BuiltinLoader, FILE_KIND_ENTRY};
pub use manager::{Plugin, PluginDescriptor, PluginLoader, PluginManager};

/// Registry of available resource handlers.
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<ResourceType, Arc<dyn ResourceHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the skill, subagent, hook and MCP handlers.
    pub fn with_builtin(env: HandlerEnv) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SkillHandler::new(env.clone())));
        registry.register(Arc::new(SubagentHandler::new(env.clone())));
        registry.register(Arc::new(HookHandler::new(env.clone())));
        registry.register(Arc::new(McpHandler::new(env)));
        registry
    }

    /// Register a handler, replacing any handler for the same type.
    pub fn register(
        &mut self,
        handler: Arc<dyn ResourceHandler>,
    ) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.insert(handler.resource_type(), handler)
    }

    pub fn unregister(&mut self, resource_type: &ResourceType) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.remove(resource_type)
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.get(resource_type).cloned()
    }

    /// Like [`get`](Self::get), but an unknown type is an error.
    pub fn require(&self, resource_type: &ResourceType) -> Result<Arc<dyn ResourceHandler>> {
        self.get(resource_type).ok_or_else(|| Error::NoTargets {
            resource_type: resource_type.clone(),
            reason: format!(
                "no handler registered (known types: {})",
                self.types()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
    }

    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.handlers.contains_key(resource_type)
    }

    pub fn types(&self) -> Vec<ResourceType> {
        self.handlers.keys().cloned().collect()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn ResourceHandler>> {
        self.handlers.values()
    }
}

/// Built-in handlers plus every plugin in `descriptors`.
pub fn build_registry(
    env: HandlerEnv,
    descriptors: &[PluginDescriptor],
) -> Result<(HandlerRegistry, PluginManager)> {
    let mut registry = HandlerRegistry::with_builtin(env.clone());
    let mut manager = PluginManager::new(env, Arc::new(BuiltinLoader));
    for descriptor in descriptors {
        manager.load(&mut registry, descriptor.clone())?;
    }
    Ok((registry, manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::context::AppContext;
    use std::path::PathBuf;

    fn env() -> HandlerEnv {
        HandlerEnv::new(
            AppContext::new(PathBuf::from("/home/u"), PathBuf::from("/work/p")),
            Arc::new(MemoryAuditSink::new()),
        )
    }

    #[test]
    fn builtin_registry_has_four_kinds() {
        let registry = HandlerRegistry::with_builtin(env());
        assert_eq!(
            registry.types(),
            vec![
                ResourceType::Skill,
                ResourceType::Subagent,
                ResourceType::Hook,
                ResourceType::Mcp
            ]
        );
        assert!(registry.contains(&ResourceType::Mcp));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = HandlerRegistry::with_builtin(env());
        let err = registry
            .require(&ResourceType::from("prompt"))
            .expect_err("unknown type should fail");
        assert!(err.to_string().contains("no handler registered"));
    }
}
