//! `check`: compare the ledger with what is on disk.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use super::LifecycleService;
use crate::agent::Agent;
use crate::error::Result;
use crate::resource::{Installation, ListError, ResourceType};
use crate::types::{ListScope, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
    /// Recorded in the ledger, gone from disk.
    Missing,
    /// On disk, not recorded in the ledger.
    Untracked,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            DriftKind::Missing => "missing",
            DriftKind::Untracked => "untracked",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drift {
    pub kind: DriftKind,
    pub resource_type: ResourceType,
    pub name: String,
    pub agent: Agent,
    pub scope: Scope,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub drift: Vec<Drift>,
    /// Installation records removed from the ledger (`--prune` only).
    pub pruned: usize,
    /// Locations that could not be read while looking for untracked entries.
    pub errors: Vec<ListError>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty() && self.errors.is_empty()
    }

    pub fn missing(&self) -> impl Iterator<Item = &Drift> {
        self.drift.iter().filter(|d| d.kind == DriftKind::Missing)
    }
}

impl LifecycleService {
    /// Report drift between the ledger and disk for every scope in `scope`.
    ///
    /// Nothing is repaired. With `prune`, installation records whose files
    /// are gone are dropped from the ledger; untracked files are only
    /// reported.
    pub async fn check(&self, scope: ListScope, prune: bool) -> Result<CheckReport> {
        let mut report = CheckReport::default();

        for scope in scope.scopes() {
            let lock = self.ctx.lock_manager(*scope);
            let lockfile = lock.load().await?;

            for entry in lockfile.entries() {
                let Some(handler) = self.registry.get(&entry.resource_type) else {
                    warn!(
                        resource_type = %entry.resource_type,
                        name = %entry.name,
                        "no handler for ledger entry, skipping"
                    );
                    continue;
                };

                let mut stale: Vec<Installation> = Vec::new();
                for installation in &entry.installed_for {
                    if !handler.is_installed(&entry.name, installation).await? {
                        report.drift.push(Drift {
                            kind: DriftKind::Missing,
                            resource_type: entry.resource_type.clone(),
                            name: entry.name.clone(),
                            agent: installation.agent,
                            scope: installation.scope,
                            path: installation.path.clone(),
                        });
                        stale.push(installation.clone());
                    }
                }
                if prune && !stale.is_empty() {
                    lock.prune(&entry.resource_type, &entry.name, &stale).await?;
                    report.pruned += stale.len();
                }
            }

            for handler in self.registry.handlers() {
                let resource_type = handler.resource_type();
                let listed = handler.list(ListScope::from(*scope)).await?;
                report.errors.extend(listed.errors);
                for found in listed.resources {
                    let recorded = lockfile.get(&resource_type, &found.resource.name);
                    for installation in found.installed_for {
                        let tracked = recorded.is_some_and(|entry| {
                            entry.installed_for.iter().any(|i| {
                                i.agent == installation.agent && i.scope == installation.scope
                            })
                        });
                        if !tracked {
                            report.drift.push(Drift {
                                kind: DriftKind::Untracked,
                                resource_type: resource_type.clone(),
                                name: found.resource.name.clone(),
                                agent: installation.agent,
                                scope: installation.scope,
                                path: installation.path,
                            });
                        }
                    }
                }
            }
        }

        if report.pruned > 0 {
            info!(pruned = report.pruned, "pruned stale ledger records");
        }
        Ok(report)
    }
}
