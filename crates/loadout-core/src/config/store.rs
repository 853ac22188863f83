//! Config store for loading and saving loadout.toml.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::schema::{CONFIG_FILE_NAME, LoadoutConfig, parse_config_str};
use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::fs::write_atomic;
use crate::types::Scope;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    scope: Scope,
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(scope: Scope, global_dir: PathBuf, project_root: PathBuf) -> Self {
        let config_path = match scope {
            Scope::Global => global_dir.join(CONFIG_FILE_NAME),
            Scope::Project => project_root.join(CONFIG_FILE_NAME),
        };
        Self { scope, config_path }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load this layer. A missing file yields the defaults.
    pub async fn load(&self) -> Result<LoadoutConfig> {
        let content = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.config_path.display(), "no config file");
                return Ok(LoadoutConfig::new());
            }
            Err(err) => return Err(Error::io(&self.config_path, err)),
        };
        parse_config_str(&self.config_path, &content)
    }

    pub async fn save(&self, config: &LoadoutConfig) -> Result<()> {
        let content =
            toml::to_string_pretty(config).map_err(|e| Error::parse(&self.config_path, e))?;
        write_atomic(&self.config_path, content.as_bytes()).await
    }
}

/// Global layer merged with the project layer.
pub async fn load_effective(ctx: &AppContext) -> Result<LoadoutConfig> {
    let global = ctx.config_store(Scope::Global).load().await?;
    let project = ctx.config_store(Scope::Project).load().await?;
    Ok(global.merged_with(project))
}
