pub mod assign;
pub mod cache;
pub mod graph;
pub mod init;
pub mod item;
pub mod query;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::file::FileCache;
use crate::config::EngineConfig;
use crate::error::{RbacError, Result};
use crate::item::Params;
use crate::manager::Manager;
use crate::storage::jsonl::JsonlStore;

/// Subdirectory of the data dir holding snapshot files.
pub const CACHE_DIR: &str = "cache";

/// Open the manager for an initialized data directory: JSONL store at the
/// root, file-backed graph cache under `cache/`.
pub fn open(dir: &Path) -> Result<Manager> {
    if !dir.is_dir() {
        return Err(RbacError::Storage {
            reason: format!(
                "{} does not exist; run `rolegraph init` first",
                dir.display()
            ),
        });
    }
    let config = EngineConfig::load_dir(dir)?;
    let store = Arc::new(JsonlStore::new(dir.to_path_buf()));
    let cache = Arc::new(FileCache::new(dir.join(CACHE_DIR)));
    Ok(Manager::new(store, config).with_cache_backend(cache))
}

/// Parse `key=value` pairs into rule params. Values that parse as JSON
/// (numbers, booleans, quoted strings) keep their type; anything else is
/// taken as a plain string.
pub fn parse_params(pairs: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(RbacError::InvalidInput {
                reason: format!("invalid param '{}': expected key=value", pair),
            });
        };
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.trim().to_string(), value);
    }
    Ok(params)
}
