// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WithinError};

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "WITHIN_CONFIG";

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        WithinError::ConfigError(format!("reading {}: {e}", path.display()))
    })?;

    toml::from_str(&contents)
        .map_err(|e| WithinError::ConfigError(format!("{}: {}", path.display(), e.message())))
}

/// Load a config file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// Config file to use: the `--config` flag if given, else `WITHIN_CONFIG`.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    cli_path.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

/// Load the effective configuration. Without any config file this is all
/// defaults; a named file that is missing or invalid is an error.
pub fn load_settings(cli_path: Option<&Path>) -> Result<ConfigFile> {
    match resolve_config_path(cli_path) {
        Some(path) => load_and_validate(path),
        None => Ok(ConfigFile::default()),
    }
}
