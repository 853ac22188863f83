//! Configuration for `loadout.toml`.
//!
//! Two layers are merged, project over global:
//! - Global: `<config_dir>/loadout/loadout.toml`
//! - Project: `<project>/loadout.toml`

pub mod schema;
pub mod store;

pub use schema::{CONFIG_FILE_NAME, LoadoutConfig, parse_config_str};
pub use store::{ConfigStore, load_effective};
