//! Config loading facade: composes the sources in precedence order,
//! deserializes, validates and resolves relative paths.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::PlannerConfig;
use crate::error::ApiError;
use config::{File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then workspace files, then the
    /// environment. Relative paths resolve against `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<PlannerConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let mut config: PlannerConfig = builder.build()?.try_deserialize()?;
        config.ensure_valid()?;
        config.resolve_paths(workspace_root);
        debug!(
            workspace_root = %workspace_root.display(),
            providers = config.providers.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// A single file on top of the defaults; no global, workspace or
    /// environment layers. Relative paths resolve against the file's directory.
    pub fn load_from_file(path: &Path) -> Result<PlannerConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let mut config: PlannerConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.ensure_valid()?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_paths(&root);
        Ok(config)
    }

    /// Where the global file would be read from.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
