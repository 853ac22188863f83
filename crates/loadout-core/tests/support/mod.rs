#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use loadout_core::audit::MemoryAuditSink;
use loadout_core::context::AppContext;
use loadout_core::handler::HandlerEnv;
use loadout_core::orchestration::LifecycleService;
use loadout_core::plugin::HandlerRegistry;
use loadout_core::source::SourceResolver;
use tempfile::TempDir;

pub const FMT_HOOK: &str =
    r#"{"hookType":"PreToolUse","command":"cargo fmt","description":"Format before edits"}"#;

pub const REVIEWER: &str =
    "---\nname: reviewer\ndescription: Reviews diffs\ntools: [Read, Grep]\n---\n\nYou review code.\n";

pub const PDF_SKILL: &str = "---\nname: pdf\ndescription: Work with PDF files\n---\n\n# PDF\n";

/// Temporary home, project and source roots with a recording audit sink.
pub struct Fixture {
    pub temp: TempDir,
    pub ctx: AppContext,
    pub audit: MemoryAuditSink,
    pub env: HandlerEnv,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let home = temp.path().join("home");
        let project = temp.path().join("project");
        std::fs::create_dir_all(&home).expect("Failed to create home dir");
        std::fs::create_dir_all(&project).expect("Failed to create project dir");

        let ctx = AppContext::new(home, project);
        let audit = MemoryAuditSink::new();
        let env = HandlerEnv::new(ctx.clone(), Arc::new(audit.clone()));
        Self {
            temp,
            ctx,
            audit,
            env,
        }
    }

    pub fn home(&self) -> &Path {
        self.ctx.home_dir()
    }

    pub fn project(&self) -> &Path {
        self.ctx.project_root()
    }

    /// Directory for source trees, outside both scope roots.
    pub fn source_dir(&self) -> PathBuf {
        self.temp.path().join("src")
    }

    /// Absolute source string for `source_dir()`.
    pub fn source(&self) -> String {
        self.source_dir().display().to_string()
    }

    /// Write `content` at `relative` under the temp root, creating parents.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).expect("Failed to read file")
    }

    pub fn registry(&self) -> HandlerRegistry {
        HandlerRegistry::with_builtin(self.env.clone())
    }

    pub fn service(&self) -> LifecycleService {
        self.service_with(self.registry())
    }

    /// Service sharing this fixture's home but rooted at another project.
    pub fn service_in(&self, project: &Path) -> LifecycleService {
        std::fs::create_dir_all(project).expect("Failed to create project dir");
        let ctx = AppContext::new(self.home().to_path_buf(), project.to_path_buf());
        let env = HandlerEnv::new(ctx.clone(), Arc::new(self.audit.clone()));
        LifecycleService::new(
            ctx.clone(),
            HandlerRegistry::with_builtin(env),
            SourceResolver::new(ctx),
        )
    }

    pub fn service_with(&self, registry: HandlerRegistry) -> LifecycleService {
        LifecycleService::new(
            self.ctx.clone(),
            registry,
            SourceResolver::new(self.ctx.clone()),
        )
    }
}
