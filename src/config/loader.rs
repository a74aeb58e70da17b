// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;

/// File name looked up in the client root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "Buildwatch.toml";

/// Read and deserialize a configuration file.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// defaults and semantic checks.
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Parse configuration from a TOML string.
pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(contents)?;
    ConfigFile::try_from(raw)
}

/// Load and validate the configuration at `path`.
///
/// A missing file yields the built-in defaults.
pub fn load_and_validate(fs: &dyn FileSystem, path: &Path) -> Result<ConfigFile> {
    let raw = if fs.is_file(path) {
        load_from_path(fs, path)?
    } else {
        debug!(path = ?path, "no config file; using defaults");
        RawConfigFile::default()
    };
    ConfigFile::try_from(raw)
}

/// Resolve the config path: relative paths are taken relative to the client
/// root, an empty value means [`DEFAULT_CONFIG_FILE`].
pub fn resolve_config_path(root: &Path, configured: &str) -> PathBuf {
    let configured = configured.trim();
    let name = if configured.is_empty() {
        DEFAULT_CONFIG_FILE
    } else {
        configured
    };
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
