//! Locating the configuration file.

use std::path::{Path, PathBuf};

/// Full path to the configuration file.
pub const CONFIG_FILE_PATH_ENV: &str = "INSTRUMENT_SEARCH_PROVIDER_CONFIG_FILE_PATH";

/// File name looked up inside the default configuration directory.
pub const CONFIG_FILE_NAME_ENV: &str = "INSTRUMENT_SEARCH_PROVIDER_CONFIG_FILE_NAME";

pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.toml";

pub const CONFIG_DIR_NAME: &str = "instrument-search";

/// Where the configuration comes from.
///
/// Resolution order:
/// 1. An explicit path (CLI flag or embedding host setting)
/// 2. `INSTRUMENT_SEARCH_PROVIDER_CONFIG_FILE_PATH`, when it names a file
/// 3. `INSTRUMENT_SEARCH_PROVIDER_CONFIG_FILE_NAME` (default `config.toml`)
///    inside `~/.config/instrument-search`
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    explicit: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        match &self.explicit {
            Some(path) => path.clone(),
            None => resolve_config_path(),
        }
    }
}

/// Resolve the configuration path from the environment.
pub fn resolve_config_path() -> PathBuf {
    if let Some(path) = non_empty_env(CONFIG_FILE_PATH_ENV).map(PathBuf::from) {
        if path.is_file() {
            return path;
        }
        tracing::warn!(
            "{} points to {}, which is not a file; falling back to the default location",
            CONFIG_FILE_PATH_ENV,
            path.display()
        );
    }

    let file_name =
        non_empty_env(CONFIG_FILE_NAME_ENV).unwrap_or_else(|| DEFAULT_CONFIG_FILE_NAME.to_string());
    default_config_dir().join(file_name)
}

fn default_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(CONFIG_DIR_NAME)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        Self::explicit(path)
    }
}
