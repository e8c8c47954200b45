//! Configuration file resolution and TOML bootstrap loading
//!
//! Config file priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/kardia/<file>`)
//! 4. System config directory (`/etc/kardia/<file>`, Linux only)
//!
//! A missing file is never fatal: callers receive built-in defaults, and the returned
//! [`ConfigSource`] says so.
//! A file that exists but fails to parse is a configuration error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration shared by every Kardia binary
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the TOML config file for a tool.
///
/// Returns `None` when no candidate exists; the caller then runs on defaults.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    if let Some(user_config) = dirs::config_dir().map(|d| d.join("kardia").join(file_name)) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/kardia").join(file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Where a loaded configuration came from
///
/// Config is read before the tracing subscriber exists, so the loader reports its
/// origin instead of logging; call [`ConfigSource::log`] once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No candidate file, built-in defaults
    Defaults,
    /// A path was given but nothing exists there, built-in defaults
    MissingFile(PathBuf),
    /// Parsed from this file
    File(PathBuf),
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::Defaults => info!("No config file found, using built-in defaults"),
            ConfigSource::MissingFile(path) => warn!(
                "Config file {} does not exist, using built-in defaults",
                path.display()
            ),
            ConfigSource::File(path) => info!("Loaded config file {}", path.display()),
        }
    }
}

/// Load a TOML bootstrap config, falling back to `T::default()` when the file is absent
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<(T, ConfigSource)>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok((T::default(), ConfigSource::Defaults));
    };

    if !path.exists() {
        return Ok((T::default(), ConfigSource::MissingFile(path.to_path_buf())));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok((config, ConfigSource::File(path.to_path_buf())))
}
