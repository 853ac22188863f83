//! Loadout - resource manager for coding agents
//!
//! Usage:
//!   loadout add <source>           # Install skills, subagents, hooks or MCP servers
//!   loadout remove <type> <name>   # Remove an installed resource
//!   loadout list                   # Show what is installed
//!   loadout check --prune          # Reconcile the ledger with disk

mod interactive;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loadout_core::agent::Agent;
use loadout_core::audit::TracingAuditSink;
use loadout_core::config::{LoadoutConfig, load_effective};
use loadout_core::context::AppContext;
use loadout_core::fs::InstallMode;
use loadout_core::handler::InstallOptions;
use loadout_core::orchestration::{
    AcceptAll, AddReport, AddRequest, CheckReport, LifecycleService, ListReport, ListRequest,
    RemoveRequest, Selector, TargetRequest, UpdateRequest,
};
use loadout_core::plugin::PluginManager;
use loadout_core::resource::ResourceType;
use loadout_core::types::{ListScope, Scope};

use crate::interactive::PromptSelector;

#[derive(Parser)]
#[command(name = "loadout")]
#[command(
    about = "Install skills, subagents, hooks and MCP servers into coding agents",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install resources from a source
    Add(Box<AddArgs>),

    /// Remove an installed resource
    #[command(alias = "rm")]
    Remove {
        /// Resource type (skill, subagent, hook, mcp or a plugin type)
        r#type: String,
        /// Resource name
        name: String,
        /// Remove from the global scope instead of the project
        #[arg(short = 'g', long)]
        global: bool,
        /// Only remove for these agents
        #[arg(long = "agent", value_name = "AGENT")]
        agents: Vec<String>,
        /// Continue past per-target failures
        #[arg(long, short)]
        force: bool,
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },

    /// List installed resources
    #[command(alias = "ls")]
    List {
        /// Only this resource type
        #[arg(long, short = 't')]
        r#type: Option<String>,
        /// Global scope only
        #[arg(short = 'g', long, conflicts_with = "project")]
        global: bool,
        /// Project scope only
        #[arg(short = 'p', long)]
        project: bool,
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Reinstall a resource from its recorded source
    Update {
        r#type: String,
        name: String,
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Check resources in a source without installing them
    Validate {
        source: String,
        /// Only this resource type
        #[arg(long, short = 't')]
        r#type: Option<String>,
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Compare the ledger with what is on disk
    Check {
        /// Drop ledger records whose files are gone
        #[arg(long)]
        prune: bool,
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show supported agents and whether they are detected
    Agents {
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show registered resource types and loaded plugins
    Plugins {
        /// Output format
        #[arg(short = 'o', long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// Only show issues (non-zero exit if problems)
    Quiet,
}

#[derive(Args)]
struct AddArgs {
    /// Source: ./path, owner/repo[@ref], github:owner/repo@ref/path, a git URL or an https URL
    source: String,
    /// Only install this resource type
    #[arg(long, short = 't')]
    r#type: Option<String>,
    /// Install into the global scope instead of the project
    #[arg(short = 'g', long)]
    global: bool,
    /// Overwrite existing resources
    #[arg(long, short)]
    force: bool,
    /// Skip all prompts (for CI/CD)
    #[arg(short = 'y', long)]
    yes: bool,
    /// Target agents (defaults to config, then detected agents)
    #[arg(long = "agent", value_name = "AGENT")]
    agents: Vec<String>,
    /// Install mode (copy or symlink)
    #[arg(long)]
    mode: Option<String>,
    /// Only install resources with these names
    #[arg(long = "name", value_name = "NAME")]
    names: Vec<String>,
    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadout=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::from_env().context("Failed to determine home or working directory")?;
    let config = load_effective(&ctx)
        .await
        .context("Failed to load loadout.toml")?;
    tracing::debug!(
        plugins = config.plugins.len(),
        default_agents = ?config.default_agents,
        "configuration loaded"
    );
    let (service, plugins) =
        LifecycleService::bootstrap(ctx, Arc::new(TracingAuditSink), &config)
            .context("Failed to load plugins")?;

    run_cli(cli.command, &service, &plugins, &config).await
}

async fn run_cli(
    command: Commands,
    service: &LifecycleService,
    plugins: &PluginManager,
    config: &LoadoutConfig,
) -> Result<()> {
    match command {
        Commands::Add(args) => run_add(*args, service, config).await,
        Commands::Remove {
            r#type,
            name,
            global,
            agents,
            force,
            format,
        } => {
            let request = RemoveRequest::new(ResourceType::from(r#type), name, scope_of(global))
                .with_agents(parse_agents(&agents)?)
                .with_force(force);
            let report = service
                .remove(&request)
                .await
                .with_context(|| {
                    format!("Failed to remove {} '{}'", request.resource_type, request.name)
                })?;
            match format {
                OutputFormat::Table => {
                    for target in &report.removed {
                        println!(
                            "✓ Removed {} '{}' from {}",
                            request.resource_type,
                            request.name,
                            target.label()
                        );
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Quiet => {}
            }
            Ok(())
        }
        Commands::List {
            r#type,
            global,
            project,
            format,
        } => {
            let scope = match (global, project) {
                (true, _) => ListScope::Global,
                (_, true) => ListScope::Project,
                _ => ListScope::Both,
            };
            let mut request = ListRequest::new(scope);
            if let Some(t) = r#type {
                request = request.with_type(ResourceType::from(t));
            }
            let report = service.list(&request).await?;
            match format {
                OutputFormat::Table => print_list_table(&report),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Quiet => {
                    let errors: usize = report.sections.iter().map(|(_, r)| r.errors.len()).sum();
                    if errors > 0 {
                        anyhow::bail!("{errors} location(s) could not be read");
                    }
                }
            }
            Ok(())
        }
        Commands::Update {
            r#type,
            name,
            format,
        } => {
            let request = UpdateRequest::new(ResourceType::from(r#type), name);
            let report = service
                .update(&request)
                .await
                .with_context(|| {
                    format!("Failed to update {} '{}'", request.resource_type, request.name)
                })?;
            match format {
                OutputFormat::Table => {
                    for entry in &report.entries {
                        println!(
                            "✓ Updated {} '{}' ({} location(s), source {})",
                            entry.resource_type,
                            entry.name,
                            entry.installed_for.len(),
                            entry.source
                        );
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Quiet => {}
            }
            Ok(())
        }
        Commands::Validate {
            source,
            r#type,
            format,
        } => {
            let resource_type = r#type.map(ResourceType::from);
            let results = service
                .validate_source(&source, resource_type.as_ref())
                .await
                .with_context(|| format!("Failed to read source '{source}'"))?;
            let invalid = results.iter().filter(|r| !r.report.valid).count();
            match format {
                OutputFormat::Table => {
                    if results.is_empty() {
                        println!("No resources found in {source}");
                    }
                    for item in &results {
                        let mark = if item.report.valid { "✓" } else { "✗" };
                        println!(
                            "{mark} {} '{}'",
                            item.resource.resource_type, item.resource.name
                        );
                        for error in &item.report.errors {
                            println!("    error: {error}");
                        }
                        for warning in &item.report.warnings {
                            println!("  ⚠ {warning}");
                        }
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Quiet => {}
            }
            if invalid > 0 {
                anyhow::bail!("{invalid} invalid resource(s)");
            }
            Ok(())
        }
        Commands::Check { prune, format } => {
            let report = service.check(ListScope::Both, prune).await?;
            match format {
                OutputFormat::Table => print_check_table(&report, prune),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Quiet => {}
            }
            let missing = report.missing().count();
            if missing > 0 && !prune {
                anyhow::bail!(
                    "{missing} recorded installation(s) missing on disk; run `loadout check --prune`"
                );
            }
            Ok(())
        }
        Commands::Agents { format } => {
            let registry = service.agents();
            let ctx = service.context();
            let mut rows = Vec::new();
            for agent in registry.all() {
                let detected = registry.is_detected(ctx, *agent).await;
                let kinds: Vec<String> = service
                    .registry()
                    .handlers()
                    .filter(|h| h.supported_agents().contains(agent))
                    .map(|h| h.resource_type().to_string())
                    .collect();
                rows.push((*agent, detected, kinds));
            }
            match format {
                OutputFormat::Table => {
                    println!("{:<14} {:<14} {:<10} Resource types", "Agent", "Name", "Detected");
                    println!("{}", "-".repeat(70));
                    for (agent, detected, kinds) in &rows {
                        println!(
                            "{:<14} {:<14} {:<10} {}",
                            agent.id(),
                            agent.display_name(),
                            if *detected { "yes" } else { "no" },
                            kinds.join(", ")
                        );
                    }
                }
                OutputFormat::Json => {
                    let output: Vec<_> = rows
                        .iter()
                        .map(|(agent, detected, kinds)| {
                            serde_json::json!({
                                "id": agent.id(),
                                "name": agent.display_name(),
                                "detected": detected,
                                "resourceTypes": kinds,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Quiet => {}
            }
            Ok(())
        }
        Commands::Plugins { format } => {
            let loaded = plugins.loaded();
            match format {
                OutputFormat::Table => {
                    let types: Vec<String> = service
                        .registry()
                        .types()
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    println!("Resource types: {}", types.join(", "));
                    if loaded.is_empty() {
                        println!("No plugins loaded.");
                        println!("Declare one under [[plugins]] in loadout.toml");
                    }
                    for plugin in &loaded {
                        let agents: Vec<&str> =
                            plugin.supported_agents.iter().map(|a| a.id()).collect();
                        println!(
                            "{:<20} {:<14} {:<20} {}",
                            plugin.id,
                            plugin.resource_type,
                            plugin.entry,
                            agents.join(", ")
                        );
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&loaded)?),
                OutputFormat::Quiet => {}
            }
            Ok(())
        }
    }
}

async fn run_add(args: AddArgs, service: &LifecycleService, config: &LoadoutConfig) -> Result<()> {
    let mode = match args.mode.as_deref() {
        Some(mode) => mode.parse::<InstallMode>().map_err(anyhow::Error::msg)?,
        None => config.default_mode.unwrap_or_default(),
    };
    let targets = TargetRequest::new(scope_of(args.global))
        .with_agents(parse_agents(&args.agents)?)
        .with_preferred(config.default_agents())
        .with_mode(mode);
    let mut request = AddRequest::new(&args.source, targets)
        .with_names(args.names.iter().cloned())
        .with_options(InstallOptions {
            force: args.force,
            yes: args.yes,
        });
    if let Some(t) = &args.r#type {
        request = request.with_type(ResourceType::from(t.as_str()));
    }

    let selector: Box<dyn Selector> = if args.yes || !console::user_attended() {
        Box::new(AcceptAll)
    } else {
        Box::new(PromptSelector::new())
    };
    let report = service
        .add(&request, selector.as_ref())
        .await
        .with_context(|| format!("Failed to add from '{}'", args.source))?;

    print_add_result(&report, args.format)
}

fn print_add_result(report: &AddReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            for item in &report.installed {
                println!("✓ Installed {} '{}'", item.resource_type, item.name);
                for installation in &item.installations {
                    let mode = installation
                        .mode
                        .map(|m| format!(" ({m})"))
                        .unwrap_or_default();
                    println!(
                        "  {}/{} → {}{}",
                        installation.agent,
                        installation.scope,
                        installation.path.display(),
                        mode
                    );
                }
                for warning in &item.warnings {
                    println!("  ⚠ {warning}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Quiet => {}
    }
    Ok(())
}

fn print_list_table(report: &ListReport) {
    if report.is_empty() {
        println!("Nothing installed.");
        println!("Install something with: loadout add <source>");
        return;
    }

    for (resource_type, result) in &report.sections {
        if result.is_empty() {
            continue;
        }
        println!("{resource_type}");
        for installed in &result.resources {
            let locations: Vec<String> = installed
                .installed_for
                .iter()
                .map(|i| format!("{}/{}", i.agent, i.scope))
                .collect();
            println!(
                "  {:<28} {:<36} {}",
                installed.resource.name,
                locations.join(", "),
                installed.source.as_deref().unwrap_or("(untracked)")
            );
        }
        for error in &result.errors {
            println!("  ⚠ {}/{}: {}", error.agent, error.scope, error.error);
        }
    }
}

fn print_check_table(report: &CheckReport, prune: bool) {
    if report.is_clean() {
        println!("✓ Ledger matches disk");
        return;
    }
    for drift in &report.drift {
        println!(
            "{:<10} {:<10} {:<28} {}/{} {}",
            drift.kind,
            drift.resource_type,
            drift.name,
            drift.agent,
            drift.scope,
            drift.path.display()
        );
    }
    for error in &report.errors {
        println!("⚠ {}/{}: {}", error.agent, error.scope, error.error);
    }
    if prune {
        println!("Pruned {} ledger record(s)", report.pruned);
    }
}

fn scope_of(global: bool) -> Scope {
    if global { Scope::Global } else { Scope::Project }
}

fn parse_agents(ids: &[String]) -> Result<Vec<Agent>> {
    ids.iter()
        .map(|id| id.parse::<Agent>().map_err(anyhow::Error::msg))
        .collect()
}
