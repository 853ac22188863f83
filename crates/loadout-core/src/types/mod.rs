//! Shared core types used across handlers and the lock ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Install scope.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Relative to the invocation directory.
    #[default]
    Project,
    /// Relative to the user's home directory.
    Global,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Project => "project",
            Scope::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" | "p" | "local" => Ok(Scope::Project),
            "global" | "g" | "user" => Ok(Scope::Global),
            _ => Err(format!("Invalid scope: '{}'. Use 'project' or 'global'", s)),
        }
    }
}

/// Scope filter for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListScope {
    Global,
    Project,
    #[default]
    Both,
}

impl ListScope {
    /// Concrete scopes covered by this filter, project first.
    pub fn scopes(self) -> &'static [Scope] {
        match self {
            ListScope::Global => &[Scope::Global],
            ListScope::Project => &[Scope::Project],
            ListScope::Both => &[Scope::Project, Scope::Global],
        }
    }

    pub fn includes(self, scope: Scope) -> bool {
        self.scopes().contains(&scope)
    }
}

impl From<Scope> for ListScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Project => ListScope::Project,
            Scope::Global => ListScope::Global,
        }
    }
}
