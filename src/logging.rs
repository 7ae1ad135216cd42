use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// log4rs configuration location, relative to the workspace root.
pub const LOG_CONFIG_PATH: &str = "config/log4rs.yaml";

/// Returns the log4rs configuration file for `workspace_root`, if one exists.
pub fn log_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let path = workspace_root.join(LOG_CONFIG_PATH);
    path.is_file().then_some(path)
}

/// Installs the global logger.
///
/// Uses `config/log4rs.yaml` when present, otherwise `env_logger` driven by `RUST_LOG`
/// (defaulting to `info`).
pub fn init_logging(workspace_root: &Path) -> Result<()> {
    if let Some(path) = log_config_path(workspace_root) {
        log4rs::init_file(&path, Default::default())
            .with_context(|| format!("Failed to load log configuration: {}", path.display()))?;
        return Ok(());
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .context("Failed to initialize logger")?;
    Ok(())
}
