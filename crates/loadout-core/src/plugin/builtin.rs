//! Loader for plugin kinds that ship with loadout.

use std::sync::Arc;

use tracing::debug;

use super::manager::{Plugin, PluginDescriptor, PluginLoader};
use crate::error::{Error, Result};
use crate::handler::file_kind::FileKindOptions;
use crate::handler::{FileKindHandler, HandlerEnv, ResourceHandler};

/// Entry point of the generic one-file-per-resource kind.
pub const FILE_KIND_ENTRY: &str = "builtin:file-kind";

/// Resolves `builtin:*` entries; anything else is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl PluginLoader for BuiltinLoader {
    fn load(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn Plugin>> {
        match descriptor.entry.as_str() {
            FILE_KIND_ENTRY => {
                let options =
                    FileKindOptions::from_options(&descriptor.resource_type, &descriptor.options)
                        .map_err(|err| Error::Plugin {
                            id: descriptor.id.clone(),
                            reason: match err {
                                Error::Plugin { reason, .. } => reason,
                                other => other.to_string(),
                            },
                        })?;
                Ok(Box::new(FileKindPlugin {
                    descriptor: descriptor.clone(),
                    options,
                }))
            }
            other => Err(Error::Plugin {
                id: descriptor.id.clone(),
                reason: format!("unknown plugin entry '{other}'"),
            }),
        }
    }
}

#[derive(Debug)]
struct FileKindPlugin {
    descriptor: PluginDescriptor,
    options: FileKindOptions,
}

impl Plugin for FileKindPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn create_handler(&self, env: HandlerEnv) -> Result<Arc<dyn ResourceHandler>> {
        Ok(Arc::new(FileKindHandler::new(
            env,
            self.descriptor.resource_type.clone(),
            self.descriptor.supported_agents.clone(),
            self.options.clone(),
        )))
    }

    fn on_load(&self) -> Result<()> {
        debug!(
            plugin = %self.descriptor.id,
            extension = %self.options.extension,
            directory = %self.options.directory,
            "file-kind plugin ready"
        );
        Ok(())
    }
}
