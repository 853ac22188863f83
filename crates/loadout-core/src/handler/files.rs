//! Shared plumbing for kinds stored as one file or one directory per resource.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{HandlerEnv, InstallOptions, RemoveOptions};
use crate::agent::Agent;
use crate::audit::{AuditAction, AuditEvent, AuditOutcome};
use crate::error::{Error, Result};
use crate::fs::{
    InstallMode, contained_path, path_occupied, place_file, remove_path, validate_resource_name,
};
use crate::resource::{
    InstallTarget, Installation, ListResult, Resource, ResourceFile, ResourceType,
};
use crate::types::Scope;

/// Directory names never descended into while scanning sources.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "__pycache__"];

/// Deepest directory level scanned during discovery.
pub const MAX_SCAN_DEPTH: usize = 8;

/// How one resource is laid out under its install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryShape {
    /// `<root>/<name>/...`, recognised by a marker file inside.
    Directory { marker: String },
    /// `<root>/<name>.<extension>`
    File { extension: String },
}

/// One target's worth of pending writes, computed before touching disk.
#[derive(Debug)]
struct TargetPlan<'a> {
    target: InstallTarget,
    entry: PathBuf,
    writes: Vec<PlannedWrite<'a>>,
}

#[derive(Debug)]
struct PlannedWrite<'a> {
    dest: PathBuf,
    canonical: PathBuf,
    content: &'a str,
}

/// File-backed storage for one resource kind.
#[derive(Debug, Clone)]
pub struct FileStore {
    env: HandlerEnv,
    resource_type: ResourceType,
    shape: EntryShape,
}

impl FileStore {
    pub fn new(env: HandlerEnv, resource_type: ResourceType, shape: EntryShape) -> Self {
        Self {
            env,
            resource_type,
            shape,
        }
    }

    pub fn env(&self) -> &HandlerEnv {
        &self.env
    }

    pub fn shape(&self) -> &EntryShape {
        &self.shape
    }

    /// Entry name for a resource (`name` or `name.ext`).
    pub fn entry_name(&self, name: &str) -> String {
        match &self.shape {
            EntryShape::Directory { .. } => name.to_string(),
            EntryShape::File { extension } => format!("{name}.{extension}"),
        }
    }

    /// Contained entry path for a resource name under `root`.
    pub fn entry_path(&self, root: &Path, name: &str) -> Result<PathBuf> {
        validate_resource_name(name).map_err(|reason| Error::Validation {
            resource_type: self.resource_type.clone(),
            name: name.to_string(),
            errors: vec![reason],
        })?;
        contained_path(root, &self.entry_name(name))
    }

    /// Files to write relative to the install root, paired with content.
    fn relative_files<'a>(&self, resource: &'a Resource) -> Result<Vec<(String, &'a str)>> {
        match &self.shape {
            EntryShape::Directory { .. } => Ok(resource
                .files
                .iter()
                .map(|f| (format!("{}/{}", resource.name, f.path), f.content.as_str()))
                .collect()),
            EntryShape::File { .. } => {
                let file = resource.files.first().ok_or_else(|| Error::Validation {
                    resource_type: self.resource_type.clone(),
                    name: resource.name.clone(),
                    errors: vec!["resource has no file content".to_string()],
                })?;
                Ok(vec![(self.entry_name(&resource.name), file.content.as_str())])
            }
        }
    }

    fn plan<'a>(
        &self,
        resource: &'a Resource,
        roots: &[(InstallTarget, PathBuf)],
    ) -> Result<Vec<TargetPlan<'a>>> {
        let relative = self.relative_files(resource)?;
        let mut plans = Vec::with_capacity(roots.len());

        for (target, root) in roots {
            let entry = self.entry_path(root, &resource.name)?;
            // Declared paths must stay inside the root even when the shape
            // renames the file on write.
            for file in &resource.files {
                contained_path(root, &file.path)?;
            }

            let store_root = self
                .env
                .ctx
                .store_dir(target.scope)
                .join(self.resource_type.as_str());
            let mut writes = Vec::with_capacity(relative.len());
            for (rel, content) in &relative {
                writes.push(PlannedWrite {
                    dest: contained_path(root, rel)?,
                    canonical: contained_path(&store_root, rel)?,
                    content: *content,
                });
            }
            plans.push(TargetPlan {
                target: *target,
                entry,
                writes,
            });
        }
        Ok(plans)
    }

    /// Write a resource to every target, in order, stopping at the first
    /// failure. Paths for all targets are validated before anything is
    /// written.
    pub async fn install(
        &self,
        resource: &Resource,
        roots: &[(InstallTarget, PathBuf)],
        options: &InstallOptions,
        metadata: Map<String, Value>,
    ) -> Result<Vec<Installation>> {
        let plans = self.plan(resource, roots)?;
        let mut installed = Vec::with_capacity(plans.len());

        for plan in plans {
            match self.install_target(resource, &plan, options).await {
                Ok(mode) => {
                    let mut event_meta = metadata.clone();
                    event_meta.insert("mode".to_string(), json!(mode.as_str()));
                    event_meta.insert("files".to_string(), json!(plan.writes.len()));
                    self.audit(
                        AuditAction::Install,
                        AuditOutcome::Success,
                        &resource.name,
                        &plan.target,
                        &plan.entry,
                    )
                    .with_metadata(event_meta)
                    .emit(self.env.audit.as_ref());
                    installed.push(
                        Installation::new(plan.target.agent, plan.target.scope, plan.entry)
                            .with_mode(mode),
                    );
                }
                Err(err) => {
                    self.audit(
                        AuditAction::Install,
                        AuditOutcome::Failure,
                        &resource.name,
                        &plan.target,
                        &plan.entry,
                    )
                    .with_message(err.to_string())
                    .emit(self.env.audit.as_ref());
                    return Err(err);
                }
            }
        }
        Ok(installed)
    }

    async fn install_target(
        &self,
        resource: &Resource,
        plan: &TargetPlan<'_>,
        options: &InstallOptions,
    ) -> Result<InstallMode> {
        let target = plan.target;

        if path_occupied(&plan.entry).await? {
            if !options.force {
                return Err(Error::Conflict {
                    resource_type: self.resource_type.clone(),
                    name: resource.name.clone(),
                    agent: target.agent,
                    scope: target.scope,
                    path: plan.entry.clone(),
                });
            }
            debug!(path = %plan.entry.display(), "replacing existing entry");
            remove_path(&plan.entry)
                .await
                .map_err(|e| Error::io(&plan.entry, e))?;
        }

        let mut used = target.mode;
        for write in &plan.writes {
            let mode = place_file(
                &write.dest,
                write.content,
                target.mode,
                Some(write.canonical.as_path()),
            )
            .await?;
            if mode == InstallMode::Copy {
                used = InstallMode::Copy;
            }
        }
        Ok(used)
    }

    /// Delete a resource's entry at every target.
    ///
    /// `siblings` are the install roots of agents that keep the resource; a
    /// shared symlink-mode canonical copy survives while any of them still
    /// holds the entry.
    pub async fn remove(
        &self,
        resource: &Resource,
        roots: &[(InstallTarget, PathBuf)],
        siblings: &[(Scope, PathBuf)],
        options: &RemoveOptions,
    ) -> Result<()> {
        for (target, root) in roots {
            let entry = self.entry_path(root, &resource.name)?;
            match self.remove_entry(&resource.name, &entry).await {
                Ok(()) => {
                    if !self.still_held(target.scope, &resource.name, siblings).await {
                        self.drop_canonical(target.scope, &resource.name).await;
                    }
                    self.audit(
                        AuditAction::Remove,
                        AuditOutcome::Success,
                        &resource.name,
                        target,
                        &entry,
                    )
                    .emit(self.env.audit.as_ref());
                }
                Err(err) if options.force => {
                    warn!(
                        resource = %resource.name,
                        path = %entry.display(),
                        error = %err,
                        "remove failed, continuing because of --force"
                    );
                    self.audit(
                        AuditAction::Remove,
                        AuditOutcome::Warning,
                        &resource.name,
                        target,
                        &entry,
                    )
                    .with_message(err.to_string())
                    .emit(self.env.audit.as_ref());
                }
                Err(err) => {
                    self.audit(
                        AuditAction::Remove,
                        AuditOutcome::Failure,
                        &resource.name,
                        target,
                        &entry,
                    )
                    .with_message(err.to_string())
                    .emit(self.env.audit.as_ref());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn remove_entry(&self, name: &str, entry: &Path) -> Result<()> {
        if !path_occupied(entry).await? {
            return Err(Error::NotFound {
                resource_type: self.resource_type.clone(),
                name: name.to_string(),
                path: Some(entry.to_path_buf()),
            });
        }
        remove_path(entry).await.map_err(|e| Error::io(entry, e))
    }

    async fn still_held(&self, scope: Scope, name: &str, siblings: &[(Scope, PathBuf)]) -> bool {
        for (sibling_scope, root) in siblings {
            if *sibling_scope != scope {
                continue;
            }
            if let Ok(entry) = self.entry_path(root, name)
                && path_occupied(&entry).await.unwrap_or(true)
            {
                return true;
            }
        }
        false
    }

    /// Symlink-mode canonical copy; gone or never created are both fine.
    async fn drop_canonical(&self, scope: Scope, name: &str) {
        let store_root = self
            .env
            .ctx
            .store_dir(scope)
            .join(self.resource_type.as_str());
        let Ok(canonical) = contained_path(&store_root, &self.entry_name(name)) else {
            return;
        };
        if let Err(err) = remove_path(&canonical).await
            && err.kind() != ErrorKind::NotFound
        {
            debug!(path = %canonical.display(), error = %err, "failed to drop canonical copy");
        }
    }

    /// Scan every location, decoding each entry with `decode`.
    ///
    /// Missing roots contribute nothing; unreadable roots and malformed
    /// entries become `errors` and scanning continues.
    pub async fn list<F>(&self, locations: Vec<(Agent, Scope, PathBuf)>, decode: F) -> ListResult
    where
        F: Fn(&str, Vec<ResourceFile>, &Path) -> Result<Resource>,
    {
        let mut result = ListResult::default();

        for (agent, scope, root) in locations {
            let entries = match self.scan(&root).await {
                Ok(entries) => entries,
                Err(err) => {
                    result.push_error(agent, scope, err);
                    continue;
                }
            };

            for (name, path) in entries {
                let decoded = match self.read_entry(&path).await {
                    Ok(files) => decode(&name, files, &path),
                    Err(err) => Err(err),
                };
                match decoded {
                    Ok(resource) => {
                        let mode = self.detect_mode(&path).await;
                        let installation = Installation::new(agent, scope, path).with_mode(mode);
                        result.push(resource, installation);
                    }
                    Err(err) => result.push_error(agent, scope, err),
                }
            }
        }
        result
    }

    /// Entries under `root` that match this shape, sorted by name.
    async fn scan(&self, root: &Path) -> Result<Vec<(String, PathBuf)>> {
        let mut dir = match tokio::fs::read_dir(root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::io(root, err)),
        };

        let mut found = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::io(root, e))? {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }

            match &self.shape {
                EntryShape::Directory { marker } => {
                    if tokio::fs::try_exists(path.join(marker)).await.unwrap_or(false) {
                        found.push((file_name.to_string(), path));
                    }
                }
                EntryShape::File { extension } => {
                    let suffix = format!(".{extension}");
                    if let Some(stem) = file_name.strip_suffix(&suffix)
                        && !stem.is_empty()
                    {
                        found.push((stem.to_string(), path));
                    }
                }
            }
        }
        found.sort();
        Ok(found)
    }

    async fn read_entry(&self, path: &Path) -> Result<Vec<ResourceFile>> {
        match &self.shape {
            EntryShape::File { .. } => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::io(path, e))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(vec![ResourceFile::new(name, content)])
            }
            EntryShape::Directory { .. } => read_tree(path).await,
        }
    }

    async fn detect_mode(&self, entry: &Path) -> InstallMode {
        let probe = match &self.shape {
            EntryShape::Directory { marker } => entry.join(marker),
            EntryShape::File { .. } => entry.to_path_buf(),
        };
        match tokio::fs::symlink_metadata(&probe).await {
            Ok(meta) if meta.file_type().is_symlink() => InstallMode::Symlink,
            _ => InstallMode::Copy,
        }
    }

    fn audit(
        &self,
        action: AuditAction,
        outcome: AuditOutcome,
        name: &str,
        target: &InstallTarget,
        path: &Path,
    ) -> AuditEvent {
        AuditEvent::new(
            action,
            outcome,
            self.resource_type.clone(),
            name,
            target.agent,
            target.scope,
            path.to_path_buf(),
        )
    }
}

/// Read every file under `dir` as UTF-8, with paths relative to `dir`.
pub async fn read_tree(dir: &Path) -> Result<Vec<ResourceFile>> {
    let mut files = Vec::new();
    for path in walk_files(dir, MAX_SCAN_DEPTH).await? {
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        files.push(ResourceFile::new(
            relative.to_string_lossy().replace('\\', "/"),
            content,
        ));
    }
    Ok(files)
}

/// Every regular file below `root` up to `max_depth`, sorted.
///
/// Hidden entries and common build/vendor directories are skipped. A file
/// root yields itself; a missing root is an error for the caller to judge.
pub async fn walk_files(root: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
    let meta = tokio::fs::metadata(root)
        .await
        .map_err(|e| Error::io(root, e))?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            let Ok(meta) = tokio::fs::metadata(&path).await else {
                debug!(path = %path.display(), "skipping unreadable entry");
                continue;
            };
            if meta.is_dir() {
                if depth < max_depth {
                    pending.push((path, depth + 1));
                }
            } else if meta.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Candidate files for discovery under a source directory.
///
/// A missing source directory is tolerated with a warning.
pub async fn discovery_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    match walk_files(root, MAX_SCAN_DEPTH).await {
        Ok(files) => Ok(files),
        Err(Error::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            warn!(path = %root.display(), "source directory not found, nothing to discover");
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

/// File stem as a resource name.
pub fn stem_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
