//! Ledger types for installed resources.
//!
//! The ledger is the record of what is installed, independent of re-scanning
//! disk. One ledger exists per scope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::Agent;
use crate::resource::{Installation, ResourceType};
use crate::source::{ParsedSource, SourceType};
use crate::types::Scope;

pub const LOCKFILE_VERSION: u32 = 1;

/// Persisted ledger: `resources[<type>][<name>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Lockfile format version
    pub version: u32,

    /// Timestamp of the last save
    pub generated_at: DateTime<Utc>,

    #[serde(default)]
    pub resources: BTreeMap<String, BTreeMap<String, LockEntry>>,
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            generated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    pub fn get(&self, resource_type: &ResourceType, name: &str) -> Option<&LockEntry> {
        self.resources.get(resource_type.as_str())?.get(name)
    }

    pub fn get_mut(&mut self, resource_type: &ResourceType, name: &str) -> Option<&mut LockEntry> {
        self.resources.get_mut(resource_type.as_str())?.get_mut(name)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, entry: LockEntry) {
        self.resources
            .entry(entry.resource_type.as_str().to_string())
            .or_default()
            .insert(entry.name.clone(), entry);
    }

    /// Remove an entry, dropping the type namespace once empty.
    pub fn remove(&mut self, resource_type: &ResourceType, name: &str) -> Option<LockEntry> {
        let key = resource_type.as_str();
        let namespace = self.resources.get_mut(key)?;
        let removed = namespace.remove(name);
        if namespace.is_empty() {
            self.resources.remove(key);
        }
        removed
    }

    /// All entries, ordered by type then name.
    pub fn entries(&self) -> impl Iterator<Item = &LockEntry> {
        self.resources.values().flat_map(|names| names.values())
    }

    /// Entries of one type.
    pub fn entries_of<'a>(
        &'a self,
        resource_type: &ResourceType,
    ) -> impl Iterator<Item = &'a LockEntry> + 'a {
        self.resources
            .get(resource_type.as_str())
            .into_iter()
            .flat_map(|names| names.values())
    }

    pub fn is_empty(&self) -> bool {
        self.resources.values().all(BTreeMap::is_empty)
    }

    /// Validate the lockfile
    pub fn validate(&self) -> Result<(), String> {
        if self.version != LOCKFILE_VERSION {
            return Err(format!("Unsupported lockfile version: {}", self.version));
        }
        for (type_key, names) in &self.resources {
            for (name, entry) in names {
                if entry.name != *name || entry.resource_type.as_str() != type_key {
                    return Err(format!(
                        "entry '{type_key}/{name}' does not match its key ({}/{})",
                        entry.resource_type, entry.name
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

/// One installed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Source string as the user gave it
    pub source: String,

    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    pub installed_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub installed_for: Vec<Installation>,

    /// Kind-specific fields (e.g. subagent `format`, `contentHash`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LockEntry {
    pub fn new(
        resource_type: ResourceType,
        name: impl Into<String>,
        provenance: &Provenance,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_type,
            name: name.into(),
            version: provenance.version.clone(),
            source: provenance.source.clone(),
            source_type: provenance.source_type,
            source_url: provenance.source_url.clone(),
            installed_at: now,
            updated_at: now,
            installed_for: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Merge an installation, replacing any record for the same location.
    pub fn upsert_installation(&mut self, installation: Installation) {
        match self
            .installed_for
            .iter_mut()
            .find(|i| i.same_location(&installation))
        {
            Some(existing) => *existing = installation,
            None => self.installed_for.push(installation),
        }
    }

    /// Drop every installation for `(agent, scope)`. Returns how many went.
    pub fn drop_installations(&mut self, agent: Agent, scope: Scope) -> usize {
        let before = self.installed_for.len();
        self.installed_for
            .retain(|i| !(i.agent == agent && i.scope == scope));
        before - self.installed_for.len()
    }

    /// Source string to resolve again on update.
    ///
    /// Local entries use the absolute path recorded at install time so the
    /// result does not depend on the current project root.
    pub fn recorded_source(&self) -> String {
        match (self.source_type, &self.source_url) {
            (SourceType::Local, Some(path)) => format!("local:{path}"),
            _ => self.source.clone(),
        }
    }

    pub fn targets(&self) -> Vec<(Agent, Scope)> {
        let mut targets: Vec<(Agent, Scope)> = Vec::new();
        for i in &self.installed_for {
            if !targets.contains(&(i.agent, i.scope)) {
                targets.push((i.agent, i.scope));
            }
        }
        targets
    }
}

/// Where a resource came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source: String,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub version: Option<String>,
}

impl Provenance {
    pub fn from_parsed(source: &ParsedSource) -> Self {
        Self {
            source: source.original.clone(),
            source_type: source.source_type,
            source_url: Some(source.url.clone()),
            version: source.reference.clone(),
        }
    }
}
