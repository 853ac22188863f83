//! Configuration schema for loadout.toml

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::fs::InstallMode;
use crate::plugin::PluginDescriptor;

pub const CONFIG_FILE_NAME: &str = "loadout.toml";

/// Root configuration structure for loadout.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadoutConfig {
    /// Install mode used when `--mode` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mode: Option<InstallMode>,

    /// Agent ids targeted when `--agent` is not given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_agents: Vec<String>,

    /// Third-party resource kinds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginDescriptor>,
}

impl LoadoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for id in &self.default_agents {
            id.parse::<Agent>()?;
        }
        let mut seen = std::collections::HashSet::new();
        for plugin in &self.plugins {
            if !seen.insert(plugin.id.as_str()) {
                return Err(format!("duplicate plugin id '{}'", plugin.id));
            }
        }
        Ok(())
    }

    /// Parsed `default_agents`; ids were checked by `validate`.
    pub fn default_agents(&self) -> Vec<Agent> {
        self.default_agents
            .iter()
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    /// Overlay `project` on top of `self` (the global layer).
    ///
    /// Scalars and lists from the project layer win when set; plugins are
    /// merged by id with the project descriptor replacing a global one.
    pub fn merged_with(mut self, project: LoadoutConfig) -> LoadoutConfig {
        if project.default_mode.is_some() {
            self.default_mode = project.default_mode;
        }
        if !project.default_agents.is_empty() {
            self.default_agents = project.default_agents;
        }
        for plugin in project.plugins {
            match self.plugins.iter_mut().find(|p| p.id == plugin.id) {
                Some(existing) => *existing = plugin,
                None => self.plugins.push(plugin),
            }
        }
        self
    }
}

/// Parse and validate loadout.toml content. `path` is used for errors only.
pub fn parse_config_str(path: &Path, content: &str) -> Result<LoadoutConfig> {
    let config: LoadoutConfig = toml::from_str(content).map_err(|e| Error::parse(path, e))?;
    config.validate().map_err(|reason| Error::parse(path, reason))?;
    Ok(config)
}
