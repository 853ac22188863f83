//! End-to-end lifecycle flows: add, list, remove, update, check, validate.

mod support;

use serde_json::{Value, json};

use loadout_core::agent::Agent;
use loadout_core::error::Error;
use loadout_core::fs::{InstallMode, hash_bytes};
use loadout_core::orchestration::{
    AcceptAll, AddRequest, DriftKind, ListRequest, RemoveRequest, TargetRequest, UpdateRequest,
};
use loadout_core::resource::ResourceType;
use loadout_core::source::SourceType;
use loadout_core::types::{ListScope, Scope};

use support::{FMT_HOOK, Fixture, PDF_SKILL, REVIEWER};

fn hook_request(fx: &Fixture, agents: &[Agent]) -> AddRequest {
    AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Project).with_agents(agents.iter().copied()),
    )
    .with_type(ResourceType::Hook)
}

#[tokio::test]
async fn add_installs_and_records_provenance() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();

    let report = service
        .add(&hook_request(&fx, &[Agent::ClaudeCode]), &AcceptAll)
        .await
        .expect("add should succeed");

    assert_eq!(report.source.source_type, SourceType::Local);
    assert_eq!(report.installed.len(), 1);
    assert_eq!(report.installed[0].name, "fmt");
    assert!(fx.project().join(".claude/hooks/fmt.json").exists());

    let entry = fx
        .ctx
        .lock_manager(Scope::Project)
        .get(&ResourceType::Hook, "fmt")
        .await
        .expect("ledger should load")
        .expect("entry should be recorded");
    assert_eq!(entry.source, fx.source());
    assert_eq!(entry.source_type, SourceType::Local);
    assert_eq!(entry.installed_for.len(), 1);
    assert_eq!(entry.installed_for[0].agent, Agent::ClaudeCode);

    let listed = service
        .list(&ListRequest::new(ListScope::Project).with_type(ResourceType::Hook))
        .await
        .expect("list should succeed");
    let hooks = listed.get(&ResourceType::Hook).expect("hook section");
    let fmt = hooks.get("fmt").expect("fmt listed");
    assert_eq!(fmt.source.as_deref(), Some(fx.source().as_str()));
    assert_eq!(fmt.source_type.as_deref(), Some("local"));
    assert!(fmt.installed_at.is_some());
}

#[tokio::test]
async fn add_discovers_every_kind_in_one_source() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    fx.write("src/agents/reviewer.md", REVIEWER);
    fx.write("src/skills/pdf/SKILL.md", PDF_SKILL);
    fx.write("src/mcp.json", r#"{"mcpServers": {"alpha": {"command": "npx"}}}"#);
    let service = fx.service();

    let request = AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Project).with_agents([Agent::ClaudeCode]),
    );
    let report = service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");

    let mut installed: Vec<(ResourceType, &str)> = report
        .installed
        .iter()
        .map(|item| (item.resource_type.clone(), item.name.as_str()))
        .collect();
    installed.sort();
    assert_eq!(
        installed,
        vec![
            (ResourceType::Skill, "pdf"),
            (ResourceType::Subagent, "reviewer"),
            (ResourceType::Hook, "fmt"),
            (ResourceType::Mcp, "alpha"),
        ]
    );

    let claude = fx.project().join(".claude");
    assert!(claude.join("skills/pdf/SKILL.md").exists());
    assert_eq!(fx.read(&claude.join("agents/reviewer.md")), REVIEWER);
    assert!(claude.join("hooks/fmt.json").exists());
    let settings: Value =
        serde_json::from_str(&fx.read(&claude.join("settings.json"))).expect("settings JSON");
    assert_eq!(settings["mcpServers"]["alpha"], json!({"command": "npx"}));
}

#[tokio::test]
async fn subagent_ledger_entry_carries_format_and_hash() {
    let fx = Fixture::new();
    fx.write("src/agents/reviewer.md", REVIEWER);
    let service = fx.service();

    let request = AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Project).with_agents([Agent::ClaudeCode]),
    )
    .with_type(ResourceType::Subagent);
    service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");

    let entry = fx
        .ctx
        .lock_manager(Scope::Project)
        .get(&ResourceType::Subagent, "reviewer")
        .await
        .expect("ledger should load")
        .expect("entry should be recorded");
    assert_eq!(entry.extra["format"], "markdown");
    assert_eq!(
        entry.extra["contentHash"],
        json!(hash_bytes(REVIEWER.as_bytes()))
    );
}

#[tokio::test]
async fn add_without_agents_targets_detected_ones() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    std::fs::create_dir_all(fx.project().join(".cursor")).expect("create .cursor");
    let service = fx.service();

    let report = service
        .add(&hook_request(&fx, &[]), &AcceptAll)
        .await
        .expect("add should succeed");

    let installations = &report.installed[0].installations;
    assert_eq!(installations.len(), 1);
    assert_eq!(installations[0].agent, Agent::Cursor);
    assert!(fx.project().join(".cursor/hooks/fmt.json").exists());
}

#[tokio::test]
async fn preferred_agents_apply_only_to_kinds_they_support() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    fx.write("src/skills/pdf/SKILL.md", PDF_SKILL);
    std::fs::create_dir_all(fx.project().join(".cursor")).expect("create .cursor");
    let service = fx.service();

    let request = AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Project).with_preferred([Agent::Codex]),
    );
    let report = service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");
    assert_eq!(report.installed.len(), 2);

    assert!(fx.project().join(".codex/skills/pdf/SKILL.md").exists());
    assert!(!fx.project().join(".cursor/skills/pdf").exists());
    assert!(fx.project().join(".cursor/hooks/fmt.json").exists());
    assert!(!fx.project().join(".codex/hooks").exists());
}

#[tokio::test]
async fn add_without_agents_or_detection_has_no_targets() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);

    let err = fx
        .service()
        .add(&hook_request(&fx, &[]), &AcceptAll)
        .await
        .expect_err("nothing detected");
    assert!(matches!(err, Error::NoTargets { .. }));
}

#[tokio::test]
async fn add_rejects_explicit_unsupported_agent() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);

    let err = fx
        .service()
        .add(&hook_request(&fx, &[Agent::Roo]), &AcceptAll)
        .await
        .expect_err("roo has no hooks");
    assert!(matches!(err, Error::UnsupportedAgent { agent: Agent::Roo, .. }));
}

#[tokio::test]
async fn add_validates_every_resource_before_writing() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    fx.write("src/hooks/broken.json", r#"{"hookType":"Stop","command":"  "}"#);

    let err = fx
        .service()
        .add(&hook_request(&fx, &[Agent::ClaudeCode]), &AcceptAll)
        .await
        .expect_err("broken hook should fail validation");

    assert!(matches!(err, Error::Validation { ref name, .. } if name == "broken"));
    assert!(!fx.project().join(".claude/hooks/fmt.json").exists());
    assert!(!fx.ctx.lockfile_path(Scope::Project).exists());
}

#[tokio::test]
async fn add_of_unknown_name_is_a_source_error() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);

    let err = fx
        .service()
        .add(
            &hook_request(&fx, &[Agent::ClaudeCode]).with_names(["lint"]),
            &AcceptAll,
        )
        .await
        .expect_err("lint is not in the source");
    assert!(matches!(err, Error::SourceResolution { .. }));
}

#[tokio::test]
async fn add_of_missing_local_source_is_a_source_error() {
    let fx = Fixture::new();

    let err = fx
        .service()
        .add(&hook_request(&fx, &[Agent::ClaudeCode]), &AcceptAll)
        .await
        .expect_err("source directory does not exist");
    assert!(matches!(err, Error::SourceResolution { .. }));
}

#[tokio::test]
async fn failure_after_first_target_reports_partial_install() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    fx.write("project/.cursor/hooks/fmt.json", r#"{"hookType":"Stop","command":"mine"}"#);

    let err = fx
        .service()
        .add(
            &hook_request(&fx, &[Agent::ClaudeCode, Agent::Cursor]),
            &AcceptAll,
        )
        .await
        .expect_err("cursor target should conflict");

    match &err {
        Error::PartialInstall { completed, source } => {
            assert_eq!(completed, &vec!["hook fmt -> claude-code/project".to_string()]);
            assert!(source.is_conflict());
        }
        other => panic!("expected PartialInstall, got {other:?}"),
    }

    let entry = fx
        .ctx
        .lock_manager(Scope::Project)
        .get(&ResourceType::Hook, "fmt")
        .await
        .expect("ledger should load")
        .expect("completed target should be recorded");
    assert_eq!(entry.targets(), vec![(Agent::ClaudeCode, Scope::Project)]);
    assert!(fx.read(&fx.project().join(".cursor/hooks/fmt.json")).contains("mine"));
}

#[tokio::test]
async fn remove_narrows_by_agent_then_drops_entry() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();
    service
        .add(
            &hook_request(&fx, &[Agent::ClaudeCode, Agent::Cursor]),
            &AcceptAll,
        )
        .await
        .expect("add should succeed");

    let report = service
        .remove(
            &RemoveRequest::new(ResourceType::Hook, "fmt", Scope::Project)
                .with_agents([Agent::Cursor]),
        )
        .await
        .expect("remove should succeed");
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].agent, Agent::Cursor);
    let remaining = report.remaining.expect("claude-code still recorded");
    assert_eq!(remaining.targets(), vec![(Agent::ClaudeCode, Scope::Project)]);
    assert!(!fx.project().join(".cursor/hooks/fmt.json").exists());
    assert!(fx.project().join(".claude/hooks/fmt.json").exists());

    let report = service
        .remove(&RemoveRequest::new(ResourceType::Hook, "fmt", Scope::Project))
        .await
        .expect("remove should succeed");
    assert!(report.remaining.is_none());
    assert!(!fx.project().join(".claude/hooks/fmt.json").exists());
    let entry = fx
        .ctx
        .lock_manager(Scope::Project)
        .get(&ResourceType::Hook, "fmt")
        .await
        .expect("ledger should load");
    assert!(entry.is_none());
}

#[tokio::test]
async fn remove_of_untracked_resource_uses_disk() {
    let fx = Fixture::new();
    fx.write("project/.cursor/hooks/manual.json", FMT_HOOK);

    let report = fx
        .service()
        .remove(&RemoveRequest::new(ResourceType::Hook, "manual", Scope::Project))
        .await
        .expect("remove should succeed");

    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].agent, Agent::Cursor);
    assert!(!fx.project().join(".cursor/hooks/manual.json").exists());
}

#[tokio::test]
async fn remove_of_unknown_resource_is_not_found() {
    let fx = Fixture::new();

    let err = fx
        .service()
        .remove(&RemoveRequest::new(ResourceType::Hook, "ghost", Scope::Project).with_force(true))
        .await
        .expect_err("nothing to remove");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_reinstalls_from_recorded_source() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();
    service
        .add(&hook_request(&fx, &[Agent::ClaudeCode]), &AcceptAll)
        .await
        .expect("add should succeed");

    fx.write(
        "src/hooks/fmt.json",
        r#"{"hookType":"PreToolUse","command":"cargo fmt --all","description":"Format"}"#,
    );
    let report = service
        .update(&UpdateRequest::new(ResourceType::Hook, "fmt"))
        .await
        .expect("update should succeed");

    assert_eq!(report.entries.len(), 1);
    let entry = &report.entries[0];
    assert!(entry.updated_at >= entry.installed_at);
    assert_eq!(entry.installed_for.len(), 1);

    let body: Value = serde_json::from_str(&fx.read(&fx.project().join(".claude/hooks/fmt.json")))
        .expect("hook body should be JSON");
    assert_eq!(body["command"], "cargo fmt --all");
}

#[tokio::test]
async fn relative_source_resolves_against_project_and_records_absolute_path() {
    let fx = Fixture::new();
    fx.write("project/src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();

    let request = AddRequest::new(
        "./src",
        TargetRequest::new(Scope::Project).with_agents([Agent::ClaudeCode]),
    );
    service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");
    assert!(fx.project().join(".claude/hooks/fmt.json").exists());

    let entry = fx
        .ctx
        .lock_manager(Scope::Project)
        .get(&ResourceType::Hook, "fmt")
        .await
        .expect("ledger should load")
        .expect("entry should be recorded");
    let absolute = std::fs::canonicalize(fx.project().join("src")).expect("canonical source");
    assert_eq!(entry.source, "./src");
    assert_eq!(entry.source_url, Some(absolute.display().to_string()));
}

#[tokio::test]
async fn update_of_relative_source_ignores_current_project() {
    let fx = Fixture::new();
    fx.write("project/src/hooks/fmt.json", FMT_HOOK);
    fx.write(
        "other/src/hooks/fmt.json",
        r#"{"hookType":"PreToolUse","command":"unrelated"}"#,
    );

    let request = AddRequest::new(
        "./src",
        TargetRequest::new(Scope::Global).with_agents([Agent::ClaudeCode]),
    );
    fx.service()
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");

    fx.write(
        "project/src/hooks/fmt.json",
        r#"{"hookType":"PreToolUse","command":"cargo fmt --all"}"#,
    );
    let report = fx
        .service_in(&fx.temp.path().join("other"))
        .update(&UpdateRequest::new(ResourceType::Hook, "fmt").with_scope(ListScope::Global))
        .await
        .expect("update should succeed");
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].source, "./src");

    let installed = fx.home().join(".claude/hooks/fmt.json");
    let body: Value = serde_json::from_str(&fx.read(&installed)).expect("hook body should be JSON");
    assert_eq!(body["command"], "cargo fmt --all");
}

#[tokio::test]
async fn update_of_untracked_resource_is_not_found() {
    let fx = Fixture::new();

    let err = fx
        .service()
        .update(&UpdateRequest::new(ResourceType::Hook, "fmt"))
        .await
        .expect_err("nothing recorded");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn check_reports_drift_and_prunes_missing_records() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();
    service
        .add(&hook_request(&fx, &[Agent::ClaudeCode]), &AcceptAll)
        .await
        .expect("add should succeed");
    std::fs::remove_file(fx.project().join(".claude/hooks/fmt.json")).expect("delete hook");
    fx.write("project/.claude/hooks/manual.json", FMT_HOOK);

    let report = service
        .check(ListScope::Project, false)
        .await
        .expect("check should succeed");
    assert!(!report.is_clean());
    assert_eq!(report.pruned, 0);
    let missing: Vec<&str> = report.missing().map(|d| d.name.as_str()).collect();
    assert_eq!(missing, vec!["fmt"]);
    assert!(report.drift.iter().any(|d| d.kind == DriftKind::Untracked && d.name == "manual"));

    let report = service
        .check(ListScope::Project, true)
        .await
        .expect("check should succeed");
    assert_eq!(report.pruned, 1);
    let entry = fx
        .ctx
        .lock_manager(Scope::Project)
        .get(&ResourceType::Hook, "fmt")
        .await
        .expect("ledger should load");
    assert!(entry.is_none());
    assert!(fx.project().join(".claude/hooks/manual.json").exists());
}

#[tokio::test]
async fn validate_source_reports_each_resource() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    fx.write("src/hooks/broken.json", r#"{"hookType":"Stop","command":""}"#);

    let mut validated = fx
        .service()
        .validate_source(&fx.source(), Some(&ResourceType::Hook))
        .await
        .expect("validate should succeed");
    validated.sort_by(|a, b| a.resource.name.cmp(&b.resource.name));

    assert_eq!(validated.len(), 2);
    assert_eq!(validated[0].resource.name, "broken");
    assert!(!validated[0].report.valid);
    assert_eq!(validated[1].resource.name, "fmt");
    assert!(validated[1].report.valid);
    assert!(!fx.project().join(".claude").exists());
}

#[tokio::test]
async fn scopes_keep_separate_files_and_ledgers() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();

    let request = AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Global).with_agents([Agent::ClaudeCode]),
    )
    .with_type(ResourceType::Hook);
    service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");

    assert!(fx.home().join(".claude/hooks/fmt.json").exists());
    assert!(!fx.project().join(".claude").exists());
    assert!(fx.home().join(".loadout/lock.json").exists());
    assert!(!fx.project().join(".loadout/lock.json").exists());

    let project = service
        .list(&ListRequest::new(ListScope::Project).with_type(ResourceType::Hook))
        .await
        .expect("list should succeed");
    assert!(project.is_empty());

    let global = service
        .list(&ListRequest::new(ListScope::Global).with_type(ResourceType::Hook))
        .await
        .expect("list should succeed");
    let fmt = global
        .get(&ResourceType::Hook)
        .and_then(|hooks| hooks.get("fmt"))
        .expect("fmt listed globally");
    assert_eq!(fmt.installed_for[0].scope, Scope::Global);
    assert!(fmt.source.is_some());

    let err = service
        .remove(&RemoveRequest::new(ResourceType::Hook, "fmt", Scope::Project))
        .await
        .expect_err("not installed in the project");
    assert!(err.is_not_found());
}

#[cfg(unix)]
#[tokio::test]
async fn shared_canonical_copy_survives_partial_remove() {
    let fx = Fixture::new();
    fx.write("src/hooks/fmt.json", FMT_HOOK);
    let service = fx.service();

    let request = AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Project)
            .with_agents([Agent::ClaudeCode, Agent::Cursor])
            .with_mode(InstallMode::Symlink),
    )
    .with_type(ResourceType::Hook);
    service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");

    let canonical = fx.project().join(".loadout/store/hook/fmt.json");
    let claude = fx.project().join(".claude/hooks/fmt.json");
    let cursor = fx.project().join(".cursor/hooks/fmt.json");
    assert!(canonical.exists());
    for link in [&claude, &cursor] {
        let meta = std::fs::symlink_metadata(link).expect("link metadata");
        assert!(meta.file_type().is_symlink());
    }

    service
        .remove(
            &RemoveRequest::new(ResourceType::Hook, "fmt", Scope::Project)
                .with_agents([Agent::Cursor]),
        )
        .await
        .expect("remove should succeed");
    assert!(canonical.exists());
    let body: Value = serde_json::from_str(&fx.read(&claude)).expect("hook body should be JSON");
    assert_eq!(body["command"], "cargo fmt");

    service
        .remove(&RemoveRequest::new(ResourceType::Hook, "fmt", Scope::Project))
        .await
        .expect("remove should succeed");
    assert!(!canonical.exists());
}
