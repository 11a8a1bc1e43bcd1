use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RbacError, Result};

/// Engine configuration, read from `<dir>/config.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Roles granted to the unset user without a stored assignment.
    #[serde(default)]
    pub default_roles: Vec<String>,

    /// Graph cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Deepest hierarchy walked before a cycle is assumed. Default: 64.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_roles: Vec::new(),
            cache: CacheConfig::default(),
            max_depth: default_max_depth(),
        }
    }
}

impl EngineConfig {
    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| RbacError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load config from a data directory. Checks `<dir>/config.yml`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        Self::load_from(&dir.join("config.yml"))
    }

    /// Serialize back to YAML, used by `init`.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| RbacError::ConfigParse {
            path: "config.yml".into(),
            reason: e.to_string(),
        })
    }
}

/// Graph cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false no cache backend is used and every check walks the store.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Key the snapshot is stored under in the cache backend.
    #[serde(default = "default_cache_key")]
    pub key: String,

    /// Warm the cache at the start of an access check if it is cold. Off by
    /// default: only `load_cache` warms it.
    #[serde(default)]
    pub auto_warm: bool,
}

fn default_true() -> bool {
    true
}

fn default_cache_key() -> String {
    "rolegraph".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: default_cache_key(),
            auto_warm: false,
        }
    }
}
