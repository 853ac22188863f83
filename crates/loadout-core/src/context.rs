//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::lockfile::LockManager;
use crate::types::Scope;

/// Directory under each scope root holding loadout's own state.
pub const STATE_DIR_NAME: &str = ".loadout";

/// Explicit environment threaded through every core call.
///
/// Frontends create this once from the real home and working directories;
/// tests inject temporary roots instead.
#[derive(Debug, Clone)]
pub struct AppContext {
    home_dir: PathBuf,
    project_root: PathBuf,
    global_config_dir: PathBuf,
}

impl AppContext {
    /// Create a new context with explicit roots.
    ///
    /// The global config directory is placed under the home directory so that
    /// an injected home keeps every global write inside it.
    pub fn new(home_dir: PathBuf, project_root: PathBuf) -> Self {
        let global_config_dir = home_dir.join(".config").join("loadout");
        Self {
            home_dir,
            project_root,
            global_config_dir,
        }
    }

    /// Create context with custom global config directory.
    pub fn with_global_config_dir(
        home_dir: PathBuf,
        project_root: PathBuf,
        global_config_dir: PathBuf,
    ) -> Self {
        Self {
            home_dir,
            project_root,
            global_config_dir,
        }
    }

    /// Build a context from the process environment.
    pub fn from_env() -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            Error::io(
                "~",
                std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found"),
            )
        })?;
        let project_root = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        let global_config_dir = dirs::config_dir()
            .map(|p| p.join("loadout"))
            .unwrap_or_else(|| home_dir.join(".config").join("loadout"));

        Ok(Self::with_global_config_dir(
            home_dir,
            project_root,
            global_config_dir,
        ))
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn global_config_dir(&self) -> &Path {
        &self.global_config_dir
    }

    /// Root directory all paths of a scope live under.
    pub fn scope_root(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Project => &self.project_root,
            Scope::Global => &self.home_dir,
        }
    }

    /// `<scope root>/.loadout`
    pub fn state_dir(&self, scope: Scope) -> PathBuf {
        self.scope_root(scope).join(STATE_DIR_NAME)
    }

    pub fn lockfile_path(&self, scope: Scope) -> PathBuf {
        self.state_dir(scope).join("lock.json")
    }

    /// Canonical copies for symlink-mode installs.
    pub fn store_dir(&self, scope: Scope) -> PathBuf {
        self.state_dir(scope).join("store")
    }

    /// Get a LockManager for the given scope.
    pub fn lock_manager(&self, scope: Scope) -> LockManager {
        LockManager::new(self.lockfile_path(scope))
    }

    /// Get a ConfigStore for the given scope.
    pub fn config_store(&self, scope: Scope) -> ConfigStore {
        ConfigStore::from_paths(
            scope,
            self.global_config_dir.clone(),
            self.project_root.clone(),
        )
    }
}
