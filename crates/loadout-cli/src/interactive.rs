//! Interactive selection for `loadout add`.
//!
//! Uses dialoguer multi-select prompts to narrow discovered resources and
//! detected agents. Skipped entirely with `--yes` or when stdin is not a
//! terminal.

use std::path::PathBuf;

use console::style;
use dialoguer::{MultiSelect, theme::ColorfulTheme};

use loadout_core::agent::Agent;
use loadout_core::error::{Error, Result};
use loadout_core::orchestration::Selector;
use loadout_core::resource::{Resource, ResourceType};

/// Prompts on the terminal for every choice with more than one option.
pub struct PromptSelector {
    theme: ColorfulTheme,
}

impl PromptSelector {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn multi_select(&self, prompt: &str, labels: &[String]) -> Result<Vec<usize>> {
        let defaults = vec![true; labels.len()];
        MultiSelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(labels)
            .defaults(&defaults)
            .interact()
            .map_err(prompt_error)
    }
}

impl Selector for PromptSelector {
    fn select_resources(&self, candidates: Vec<Resource>) -> Result<Vec<Resource>> {
        if candidates.len() <= 1 {
            return Ok(candidates);
        }
        let labels: Vec<String> = candidates.iter().map(resource_label).collect();
        let chosen = self.multi_select("Resources to install", &labels)?;
        Ok(candidates
            .into_iter()
            .enumerate()
            .filter(|(i, _)| chosen.contains(i))
            .map(|(_, resource)| resource)
            .collect())
    }

    fn select_agents(
        &self,
        resource_type: &ResourceType,
        candidates: Vec<Agent>,
    ) -> Result<Vec<Agent>> {
        if candidates.len() <= 1 {
            return Ok(candidates);
        }
        let labels: Vec<String> = candidates
            .iter()
            .map(|a| format!("{} ({})", a.display_name(), a.id()))
            .collect();
        let prompt = format!("Agents to receive {resource_type} resources");
        let chosen = self.multi_select(&prompt, &labels)?;
        Ok(chosen.into_iter().filter_map(|i| candidates.get(i).copied()).collect())
    }
}

fn resource_label(resource: &Resource) -> String {
    match &resource.description {
        Some(description) => format!(
            "{} {} {}",
            style(&resource.resource_type).dim(),
            style(&resource.name).bold(),
            style(format!("- {description}")).dim()
        ),
        None => format!(
            "{} {}",
            style(&resource.resource_type).dim(),
            style(&resource.name).bold()
        ),
    }
}

fn prompt_error(err: dialoguer::Error) -> Error {
    Error::io(PathBuf::from("<terminal>"), std::io::Error::other(err))
}
