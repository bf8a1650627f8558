//! Locating and loading the configuration file

use std::path::{Path, PathBuf};

use crate::Herald;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "HERALD_CONFIG";

/// Locations searched, in order, when no path is given explicitly
pub const DEFAULT_PATHS: [&str; 2] = ["./herald.config.ron", "/etc/herald/herald.config.ron"];

/// Find the configuration file using the following precedence:
/// 1. `explicit` (the `--config` flag)
/// 2. `HERALD_CONFIG` environment variable
/// 3. ./herald.config.ron (current working directory)
/// 4. /etc/herald/herald.config.ron (system-wide config)
///
/// # Errors
///
/// Returns an error if an explicitly named file does not exist, or if none
/// of the default locations hold one.
pub fn find_config_file(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("--config points to non-existent file: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = DEFAULT_PATHS.map(PathBuf::from);
    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - --config flag\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}

/// Read and parse a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid `Herald`
/// configuration.
pub fn load(path: &Path) -> anyhow::Result<Herald> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config from {}: {e}", path.display()))?;

    parse(&content).map_err(|e| anyhow::anyhow!("Invalid config in {}: {e}", path.display()))
}

/// Parse a configuration from RON.
///
/// # Errors
///
/// Returns an error if `content` is not a valid `Herald` configuration.
pub fn parse(content: &str) -> anyhow::Result<Herald> {
    Ok(ron::from_str(content)?)
}
