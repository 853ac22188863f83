use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How resource files are materialized at an install target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    #[default]
    Copy,
    Symlink,
}

impl InstallMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallMode::Copy => "copy",
            InstallMode::Symlink => "symlink",
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(InstallMode::Copy),
            "symlink" | "link" => Ok(InstallMode::Symlink),
            _ => Err(format!("Invalid mode: '{}'. Use 'copy' or 'symlink'", s)),
        }
    }
}
