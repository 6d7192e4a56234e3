//! Workspace config file source: config/config.toml and config/{env}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Selects the environment-specific workspace file.
pub const ENV_NAME: &str = "THINKBLOCKS_ENV";

/// Add workspace config files to builder.
/// Precedence: config/config.toml (base) then config/{THINKBLOCKS_ENV}.toml.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var(ENV_NAME).unwrap_or_else(|_| "development".to_string());

    for path in [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ] {
        if path.exists() {
            debug!(config_path = %path.display(), "Loading workspace configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
    }
    Ok(builder)
}
