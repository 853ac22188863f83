//! Plugin lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::HandlerRegistry;
use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::handler::{HandlerEnv, ResourceHandler};
use crate::resource::ResourceType;

/// A third-party resource kind, as declared in `[[plugins]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub supported_agents: Vec<Agent>,
    /// Loader-specific entry point, e.g. `builtin:file-kind`
    pub entry: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl PluginDescriptor {
    fn check(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("plugin id is empty".to_string());
        }
        if self.resource_type.is_builtin() {
            return Err(format!(
                "resource type '{}' is built in and cannot be provided by a plugin",
                self.resource_type
            ));
        }
        if self.supported_agents.is_empty() {
            return Err("plugin declares no supported agents".to_string());
        }
        Ok(())
    }
}

/// A loaded plugin instance.
pub trait Plugin: Send + Sync + std::fmt::Debug {
    fn descriptor(&self) -> &PluginDescriptor;

    fn create_handler(&self, env: HandlerEnv) -> Result<Arc<dyn ResourceHandler>>;

    fn on_load(&self) -> Result<()> {
        Ok(())
    }

    fn on_unload(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolves a descriptor's `entry` to a plugin.
pub trait PluginLoader: Send + Sync + std::fmt::Debug {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn Plugin>>;
}

/// Tracks loaded plugins and keeps the handler registry in step with them.
#[derive(Debug)]
pub struct PluginManager {
    env: HandlerEnv,
    loader: Arc<dyn PluginLoader>,
    loaded: BTreeMap<String, Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new(env: HandlerEnv, loader: Arc<dyn PluginLoader>) -> Self {
        Self {
            env,
            loader,
            loaded: BTreeMap::new(),
        }
    }

    /// Validate, load and register a plugin.
    ///
    /// Nothing is registered unless every step succeeds.
    pub fn load(
        &mut self,
        registry: &mut HandlerRegistry,
        descriptor: PluginDescriptor,
    ) -> Result<()> {
        let fail = |reason: String| Error::Plugin {
            id: descriptor.id.clone(),
            reason,
        };
        descriptor.check().map_err(fail)?;
        if self.loaded.contains_key(&descriptor.id) {
            return Err(fail("a plugin with this id is already loaded".to_string()));
        }
        if registry.contains(&descriptor.resource_type) {
            return Err(fail(format!(
                "resource type '{}' is already registered",
                descriptor.resource_type
            )));
        }

        let plugin = self.loader.load(&descriptor)?;
        let handler = plugin.create_handler(self.env.clone())?;
        if handler.resource_type() != descriptor.resource_type {
            return Err(fail(format!(
                "handler serves '{}' instead of '{}'",
                handler.resource_type(),
                descriptor.resource_type
            )));
        }
        plugin.on_load()?;

        registry.register(handler);
        info!(
            plugin = %descriptor.id,
            resource_type = %descriptor.resource_type,
            "plugin loaded"
        );
        self.loaded.insert(descriptor.id, plugin);
        Ok(())
    }

    /// Unregister a plugin's handler and run its unload hook.
    pub fn unload(&mut self, registry: &mut HandlerRegistry, id: &str) -> Result<()> {
        let plugin = self.loaded.remove(id).ok_or_else(|| Error::Plugin {
            id: id.to_string(),
            reason: "plugin is not loaded".to_string(),
        })?;
        registry.unregister(&plugin.descriptor().resource_type);
        debug!(plugin = %id, "plugin unloaded");
        plugin.on_unload()
    }

    pub fn loaded(&self) -> Vec<&PluginDescriptor> {
        self.loaded.values().map(|p| p.descriptor()).collect()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.contains_key(id)
    }
}
