//! Ledger persistence.
//!
//! Each scope keeps its own ledger under its scope root
//! (`<project>/.loadout/lock.json`, `~/.loadout/lock.json`). Every mutating
//! call loads, modifies and atomically saves. Concurrent writers are not
//! serialized.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use super::types::{LockEntry, Lockfile, Provenance};
use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::fs::write_atomic;
use crate::resource::{Installation, ResourceType};
use crate::types::Scope;

/// Load/modify/save access to one scope's ledger.
#[derive(Debug, Clone)]
pub struct LockManager {
    path: PathBuf,
}

impl LockManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger. A missing file is an empty ledger.
    pub async fn load(&self) -> Result<Lockfile> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Lockfile::new()),
            Err(err) => return Err(Error::io(&self.path, err)),
        };
        let lockfile: Lockfile =
            serde_json::from_slice(&bytes).map_err(|e| Error::parse(&self.path, e))?;
        lockfile
            .validate()
            .map_err(|reason| Error::parse(&self.path, reason))?;
        Ok(lockfile)
    }

    /// Save atomically (tmp + rename), stamping `generatedAt`.
    pub async fn save(&self, lockfile: &Lockfile) -> Result<()> {
        let mut lockfile = lockfile.clone();
        lockfile.generated_at = Utc::now();
        let bytes =
            serde_json::to_vec_pretty(&lockfile).map_err(|e| Error::parse(&self.path, e))?;
        write_atomic(&self.path, &bytes).await
    }

    pub async fn get(&self, resource_type: &ResourceType, name: &str) -> Result<Option<LockEntry>> {
        Ok(self.load().await?.get(resource_type, name).cloned())
    }

    /// Entries, optionally limited to one type.
    pub async fn entries(&self, resource_type: Option<&ResourceType>) -> Result<Vec<LockEntry>> {
        let lockfile = self.load().await?;
        Ok(match resource_type {
            Some(t) => lockfile.entries_of(t).cloned().collect(),
            None => lockfile.entries().cloned().collect(),
        })
    }

    /// Record completed installations.
    ///
    /// Locations are merged without duplicates, `installedAt` survives
    /// re-installs, `updatedAt` is bumped and provenance/extras refreshed.
    pub async fn record_install(
        &self,
        resource_type: &ResourceType,
        name: &str,
        provenance: &Provenance,
        installations: &[Installation],
        extras: Map<String, Value>,
    ) -> Result<LockEntry> {
        let mut lockfile = self.load().await?;
        let now = Utc::now();

        let mut entry = match lockfile.get(resource_type, name) {
            Some(existing) => {
                let mut entry = existing.clone();
                entry.source = provenance.source.clone();
                entry.source_type = provenance.source_type;
                entry.source_url = provenance.source_url.clone();
                entry.version = provenance.version.clone();
                entry.updated_at = now;
                entry
            }
            None => LockEntry::new(resource_type.clone(), name, provenance, now),
        };
        for installation in installations {
            entry.upsert_installation(installation.clone());
        }
        entry.extra.extend(extras);

        debug!(
            resource_type = %resource_type,
            name,
            locations = entry.installed_for.len(),
            ledger = %self.path.display(),
            "recording install"
        );
        lockfile.insert(entry.clone());
        self.save(&lockfile).await?;
        Ok(entry)
    }

    /// Drop the installations for the given targets.
    ///
    /// The entry is deleted once no installation remains. Returns what is
    /// left of the entry, `None` if it is gone or was never tracked.
    pub async fn record_removal(
        &self,
        resource_type: &ResourceType,
        name: &str,
        targets: &[(Agent, Scope)],
    ) -> Result<Option<LockEntry>> {
        let mut lockfile = self.load().await?;
        let Some(entry) = lockfile.get_mut(resource_type, name) else {
            return Ok(None);
        };

        for (agent, scope) in targets {
            entry.drop_installations(*agent, *scope);
        }
        let remaining = if entry.installed_for.is_empty() {
            lockfile.remove(resource_type, name);
            None
        } else {
            entry.updated_at = Utc::now();
            Some(entry.clone())
        };

        self.save(&lockfile).await?;
        Ok(remaining)
    }

    /// Drop specific installation records (used by `check --prune`).
    pub async fn prune(
        &self,
        resource_type: &ResourceType,
        name: &str,
        stale: &[Installation],
    ) -> Result<Option<LockEntry>> {
        let mut lockfile = self.load().await?;
        let Some(entry) = lockfile.get_mut(resource_type, name) else {
            return Ok(None);
        };
        entry
            .installed_for
            .retain(|i| !stale.iter().any(|s| s.same_location(i)));

        let remaining = if entry.installed_for.is_empty() {
            lockfile.remove(resource_type, name);
            None
        } else {
            Some(entry.clone())
        };
        self.save(&lockfile).await?;
        Ok(remaining)
    }
}
