//! Agent layer: the coding-agent runtimes loadout can deploy into.
//!
//! Each agent has a fixed on-disk layout. Paths are table-driven per
//! (resource kind × agent × scope); see [`AgentSpec`].

pub mod registry;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::resource::ResourceType;
use crate::types::Scope;

pub use registry::AgentRegistry;

/// Built-in agent runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Agent {
    /// Claude Code CLI
    ClaudeCode,
    /// Cursor
    Cursor,
    /// Roo Code
    Roo,
    /// OpenAI Codex CLI
    Codex,
    /// OpenCode
    #[serde(rename = "opencode")]
    OpenCode,
}

impl Agent {
    pub const ALL: [Agent; 5] = [
        Agent::ClaudeCode,
        Agent::Cursor,
        Agent::Roo,
        Agent::Codex,
        Agent::OpenCode,
    ];

    pub fn id(self) -> &'static str {
        self.spec().id
    }

    pub fn display_name(self) -> &'static str {
        self.spec().display_name
    }

    pub fn spec(self) -> &'static AgentSpec {
        match self {
            Agent::ClaudeCode => &CLAUDE_CODE,
            Agent::Cursor => &CURSOR,
            Agent::Roo => &ROO,
            Agent::Codex => &CODEX,
            Agent::OpenCode => &OPENCODE,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Agent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Agent::ALL
            .into_iter()
            .find(|agent| agent.id() == needle || agent.spec().aliases.contains(&needle.as_str()))
            .ok_or_else(|| {
                let known: Vec<&str> = Agent::ALL.iter().map(|a| a.id()).collect();
                format!("Unknown agent: '{}'. Known agents: {}", s, known.join(", "))
            })
    }
}

/// Where a resource kind lives inside an agent's config directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindLayout {
    /// One file (or directory) per resource inside this directory.
    Directory(&'static str),
    /// Resources are keyed entries inside this single JSON document.
    Document(&'static str),
}

impl KindLayout {
    pub fn relative_path(self) -> &'static str {
        match self {
            KindLayout::Directory(p) | KindLayout::Document(p) => p,
        }
    }
}

/// Static description of one agent's layout.
#[derive(Debug)]
pub struct AgentSpec {
    pub agent: Agent,
    pub id: &'static str,
    pub display_name: &'static str,
    pub aliases: &'static [&'static str],
    /// Config directory relative to the project root.
    pub project_dir: &'static str,
    /// Config directory relative to the home directory.
    pub global_dir: &'static str,
    pub skills: Option<KindLayout>,
    pub subagents: Option<KindLayout>,
    pub hooks: Option<KindLayout>,
    pub mcp: Option<KindLayout>,
}

impl AgentSpec {
    /// Layout for a built-in resource kind, `None` if unsupported.
    ///
    /// Plugin-defined kinds carry their own directory names and only use
    /// [`AgentSpec::config_dir`].
    pub fn layout(&self, resource_type: &ResourceType) -> Option<KindLayout> {
        match resource_type {
            ResourceType::Skill => self.skills,
            ResourceType::Subagent => self.subagents,
            ResourceType::Hook => self.hooks,
            ResourceType::Mcp => self.mcp,
            ResourceType::Other(_) => None,
        }
    }

    /// The agent's config directory for a scope.
    pub fn config_dir(&self, ctx: &AppContext, scope: Scope) -> PathBuf {
        let dir = match scope {
            Scope::Project => self.project_dir,
            Scope::Global => self.global_dir,
        };
        ctx.scope_root(scope).join(dir)
    }

    /// Install location for a built-in kind at a scope.
    pub fn install_path(
        &self,
        ctx: &AppContext,
        resource_type: &ResourceType,
        scope: Scope,
    ) -> Option<PathBuf> {
        let layout = self.layout(resource_type)?;
        Some(self.config_dir(ctx, scope).join(layout.relative_path()))
    }

    /// Directories whose presence marks the agent as installed.
    pub fn detection_paths(&self, ctx: &AppContext) -> [PathBuf; 2] {
        [
            ctx.project_root().join(self.project_dir),
            ctx.home_dir().join(self.global_dir),
        ]
    }
}

static CLAUDE_CODE: AgentSpec = AgentSpec {
    agent: Agent::ClaudeCode,
    id: "claude-code",
    display_name: "Claude Code",
    aliases: &["claude", "claudecode"],
    project_dir: ".claude",
    global_dir: ".claude",
    skills: Some(KindLayout::Directory("skills")),
    subagents: Some(KindLayout::Directory("agents")),
    hooks: Some(KindLayout::Directory("hooks")),
    mcp: Some(KindLayout::Document("settings.json")),
};

static CURSOR: AgentSpec = AgentSpec {
    agent: Agent::Cursor,
    id: "cursor",
    display_name: "Cursor",
    aliases: &[],
    project_dir: ".cursor",
    global_dir: ".cursor",
    skills: Some(KindLayout::Directory("skills")),
    subagents: None,
    hooks: Some(KindLayout::Directory("hooks")),
    mcp: Some(KindLayout::Document("mcp.json")),
};

static ROO: AgentSpec = AgentSpec {
    agent: Agent::Roo,
    id: "roo",
    display_name: "Roo Code",
    aliases: &["roo-code", "roocode"],
    project_dir: ".roo",
    global_dir: ".roo",
    skills: None,
    subagents: None,
    hooks: None,
    mcp: Some(KindLayout::Document("mcp.json")),
};

static CODEX: AgentSpec = AgentSpec {
    agent: Agent::Codex,
    id: "codex",
    display_name: "Codex",
    aliases: &[],
    project_dir: ".codex",
    global_dir: ".codex",
    skills: Some(KindLayout::Directory("skills")),
    subagents: None,
    hooks: None,
    mcp: None,
};

static OPENCODE: AgentSpec = AgentSpec {
    agent: Agent::OpenCode,
    id: "opencode",
    display_name: "OpenCode",
    aliases: &["open-code"],
    project_dir: ".opencode",
    global_dir: ".config/opencode",
    skills: Some(KindLayout::Directory("skill")),
    subagents: Some(KindLayout::Directory("agent")),
    hooks: None,
    mcp: None,
};
