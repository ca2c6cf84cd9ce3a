//! Command handlers.

pub mod config_cmd;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use ihc_config::{Config, load_config_from};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config path from `--config` or the platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ihc_config::config_path)
}

/// Load and validate the config at the resolved path.
pub fn load(global: &GlobalOpts) -> Result<(Config, PathBuf), CliError> {
    let path = resolve_path(global);
    let config = load_config_from(&path).map_err(|e| CliError::from_config(e, &path))?;
    config
        .validate()
        .map_err(|e| CliError::from_config(e, &path))?;
    Ok((config, path))
}
