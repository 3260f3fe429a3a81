//! Configuration loading and working directory resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the working directory
pub const WORKING_DIR_ENV: &str = "SLOWVERB_WORKING_DIR";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "SLOWVERB_CONFIG";

/// Compiled default working directory (relative to the process working directory)
pub const DEFAULT_WORKING_DIR: &str = "files";

/// Logging section shared by every slowverb binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default config file location for the platform
///
/// `<config_dir>/slowverb/<file_name>`, e.g. `~/.config/slowverb/slowverb.toml` on Linux.
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("slowverb").join(file_name))
}

/// Config file path resolution:
/// 1. Command-line argument (highest priority)
/// 2. `SLOWVERB_CONFIG` environment variable
/// 3. Platform default
pub fn resolve_config_path(cli_arg: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path(file_name)
}

/// Load a TOML config file with graceful degradation
///
/// A missing file is not an error: a warning is logged and `T::default()` is
/// returned. A file that exists but cannot be read or parsed is a
/// configuration error.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Working directory resolution following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. `SLOWVERB_WORKING_DIR` environment variable
/// 3. TOML config value
/// 4. Compiled default (`files`)
pub fn resolve_working_dir(cli_arg: Option<&Path>, toml_value: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(WORKING_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    // Priority 4: Compiled default
    PathBuf::from(DEFAULT_WORKING_DIR)
}

/// Create the working directory (and parents) if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(Error::Config(format!(
            "Working directory path exists but is not a directory: {}",
            path.display()
        )));
    }

    std::fs::create_dir_all(path)?;
    info!(path = %path.display(), "Created working directory");
    Ok(())
}
