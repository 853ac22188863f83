//! Loadout Core Library
//!
//! Deploys skills, subagents, hooks and MCP server entries into the
//! configuration directories of coding-agent runtimes, tracking every
//! installation in a per-scope ledger.

pub mod agent;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod handler;
pub mod lockfile;
pub mod orchestration;
pub mod plugin;
pub mod resource;
pub mod source;
pub mod types;

pub use error::{Error, Result};

/// Re-exports of commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentRegistry};
    pub use crate::audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
    pub use crate::config::{ConfigStore, LoadoutConfig};
    pub use crate::context::AppContext;
    pub use crate::error::{Error, Result};
    pub use crate::fs::InstallMode;
    pub use crate::handler::{
        DiscoverOptions, HandlerEnv, InstallOptions, RemoveOptions, ResourceHandler,
    };
    pub use crate::lockfile::{LockEntry, LockManager};
    pub use crate::orchestration::{
        AcceptAll, AddRequest, LifecycleService, ListRequest, RemoveRequest, Selector,
        TargetRequest, UpdateRequest,
    };
    pub use crate::plugin::{HandlerRegistry, PluginDescriptor, PluginManager};
    pub use crate::resource::{
        InstallTarget, Installation, InstalledResource, ListResult, Resource, ResourceType,
        ValidationReport,
    };
    pub use crate::source::{ParsedSource, SourceResolver, SourceType};
    pub use crate::types::{ListScope, Scope};
}
