use crate::infrastructure::config::{CONFIG_JSON, ensure_default_config, read_config};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_path: PathBuf,
    pub database_path: PathBuf,
}

/// Prepares `<root>/config.json` and `<root>/state/autofill.sqlite`.
/// Missing files are created with defaults.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let state_dir = workspace_root.join("state");
    let config_path = workspace_root.join(CONFIG_JSON);
    let database_path = state_dir.join("autofill.sqlite");

    fs::create_dir_all(&state_dir)?;

    ensure_default_config(workspace_root)?;
    let _ = read_config(&config_path)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_path,
        database_path,
    })
}
