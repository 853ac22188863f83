mod support;

use std::sync::Arc;

use serde_json::{Map, json};

use loadout_core::agent::Agent;
use loadout_core::audit::TracingAuditSink;
use loadout_core::config::{ConfigStore, LoadoutConfig, load_effective};
use loadout_core::error::Error;
use loadout_core::orchestration::{
    AcceptAll, AddRequest, LifecycleService, ListRequest, RemoveRequest, TargetRequest,
};
use loadout_core::plugin::{
    BuiltinLoader, FILE_KIND_ENTRY, HandlerRegistry, PluginDescriptor, PluginManager,
    build_registry,
};
use loadout_core::resource::ResourceType;
use loadout_core::types::{ListScope, Scope};

use support::Fixture;

fn prompt_plugin() -> PluginDescriptor {
    let mut options = Map::new();
    options.insert("extension".to_string(), json!("md"));
    PluginDescriptor {
        id: "prompts".to_string(),
        resource_type: ResourceType::from("prompt"),
        supported_agents: vec![Agent::ClaudeCode, Agent::Cursor],
        entry: FILE_KIND_ENTRY.to_string(),
        options,
    }
}

#[tokio::test]
async fn file_kind_plugin_installs_lists_and_removes() {
    let fx = Fixture::new();
    fx.write("src/prompts/review.md", "---\ndescription: Review a diff\n---\nReview this.\n");
    let (registry, plugins) =
        build_registry(fx.env.clone(), &[prompt_plugin()]).expect("registry should build");
    assert!(plugins.is_loaded("prompts"));
    let service = fx.service_with(registry);
    let prompt = ResourceType::from("prompt");

    let request = AddRequest::new(
        fx.source(),
        TargetRequest::new(Scope::Project).with_agents([Agent::Cursor]),
    )
    .with_type(prompt.clone());
    service
        .add(&request, &AcceptAll)
        .await
        .expect("add should succeed");

    let installed = fx.project().join(".cursor/prompts/review.md");
    assert_eq!(
        fx.read(&installed),
        "---\ndescription: Review a diff\n---\nReview this.\n"
    );

    let listed = service
        .list(&ListRequest::new(ListScope::Project).with_type(prompt.clone()))
        .await
        .expect("list should succeed");
    let review = listed
        .get(&prompt)
        .and_then(|prompts| prompts.get("review"))
        .expect("review listed");
    assert_eq!(review.resource.description.as_deref(), Some("Review a diff"));
    assert!(review.source.is_some());

    service
        .remove(&RemoveRequest::new(prompt, "review", Scope::Project))
        .await
        .expect("remove should succeed");
    assert!(!installed.exists());
}

#[test]
fn unload_unregisters_the_handler() {
    let fx = Fixture::new();
    let mut registry = HandlerRegistry::with_builtin(fx.env.clone());
    let mut manager = PluginManager::new(fx.env.clone(), Arc::new(BuiltinLoader));

    manager
        .load(&mut registry, prompt_plugin())
        .expect("load should succeed");
    assert!(registry.contains(&ResourceType::from("prompt")));
    assert_eq!(manager.loaded(), vec![&prompt_plugin()]);

    manager
        .unload(&mut registry, "prompts")
        .expect("unload should succeed");
    assert!(!registry.contains(&ResourceType::from("prompt")));
    assert!(!manager.is_loaded("prompts"));
    assert_eq!(registry.types().len(), 4);

    let err = manager
        .unload(&mut registry, "prompts")
        .expect_err("already unloaded");
    assert!(matches!(err, Error::Plugin { .. }));
}

#[test]
fn plugin_cannot_claim_builtin_type() {
    let fx = Fixture::new();
    let descriptor = PluginDescriptor {
        resource_type: ResourceType::Hook,
        ..prompt_plugin()
    };

    let err = build_registry(fx.env.clone(), &[descriptor]).expect_err("hook is built in");
    assert!(matches!(err, Error::Plugin { ref id, .. } if id == "prompts"));
}

#[test]
fn second_plugin_for_same_type_is_rejected() {
    let fx = Fixture::new();
    let twin = PluginDescriptor {
        id: "more-prompts".to_string(),
        ..prompt_plugin()
    };

    let err = build_registry(fx.env.clone(), &[prompt_plugin(), twin])
        .expect_err("prompt is already registered");
    assert!(err.to_string().contains("already registered"));
}

#[test]
fn unknown_entry_is_rejected() {
    let fx = Fixture::new();
    let descriptor = PluginDescriptor {
        entry: "./plugins/prompt.so".to_string(),
        ..prompt_plugin()
    };

    let err = build_registry(fx.env.clone(), &[descriptor]).expect_err("unknown entry");
    assert!(err.to_string().contains("unknown plugin entry"));
}

#[tokio::test]
async fn bootstrap_loads_plugins_from_project_config() {
    let fx = Fixture::new();
    let config = LoadoutConfig {
        plugins: vec![prompt_plugin()],
        ..Default::default()
    };
    ConfigStore::from_paths(
        Scope::Project,
        fx.ctx.global_config_dir().to_path_buf(),
        fx.project().to_path_buf(),
    )
    .save(&config)
    .await
    .expect("save should succeed");

    let effective = load_effective(&fx.ctx).await.expect("load should succeed");
    assert_eq!(effective.plugins, vec![prompt_plugin()]);

    let (service, plugins) =
        LifecycleService::bootstrap(fx.ctx.clone(), Arc::new(TracingAuditSink), &effective)
            .expect("bootstrap should succeed");
    assert!(service.registry().contains(&ResourceType::from("prompt")));
    assert_eq!(plugins.loaded().len(), 1);
}
