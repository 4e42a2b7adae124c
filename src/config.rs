// src/config.rs

//! TOML configuration.
//!
//! Every field has a default, so a missing config file is a working setup
//! rooted in the current directory. An explicitly named file that cannot be
//! read or parsed is an error; silently running with defaults after a typo'd
//! `--config` would be worse.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "bundleforge.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub network: NetworkConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one directory per workspace.
    pub workspace_root: PathBuf,
    /// Content-addressed store of downloaded source bundles.
    pub cache_dir: PathBuf,
    /// Per-run output trees land under here.
    pub output_root: PathBuf,
    /// Idempotence manifest.
    pub manifest: PathBuf,
    /// Character roster (identifier -> names and catalog keys).
    pub roster: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            workspace_root: PathBuf::from("workspace"),
            cache_dir: PathBuf::from("sourcedata"),
            output_root: PathBuf::from("target"),
            manifest: PathBuf::from("manifest.json"),
            roster: PathBuf::from("roster.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub catalog_url: String,
    pub cdn_base_url: String,
    /// Retry budget per request before `SourceUnavailable`.
    pub max_retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            catalog_url: String::new(),
            cdn_base_url: String::new(),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Upper bound on concurrently processed work units.
    pub max_concurrency: usize,
    /// Optional run-level timeout; remaining units are skipped once reached.
    pub timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            max_concurrency: 4,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// With an explicit path, the file must exist and parse. Without one, the
    /// default file is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Self::parse_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::parse_file(default)
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE}; using defaults");
                    Ok(Config::default())
                }
            }
        }
    }

    fn parse_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Path of one workspace's mod tree.
    pub fn workspace_path(&self, workspace: &str) -> PathBuf {
        self.paths.workspace_root.join(workspace)
    }
}
