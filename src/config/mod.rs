// Configuration management module
// TOML settings stored in the game-memory data directory

pub mod interactive;
pub mod settings;


use std::path::PathBuf;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{AssistantConfig, Config, ConfigError, IndexConfig, ProviderConfig};

/// Pick the data directory: an explicit override wins, otherwise
/// `~/.game-memory`
#[inline]
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    override_dir.map_or_else(Config::default_dir, Ok)
}
