use std::fs;
use std::path::Path;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::storage::jsonl::JsonlStore;

use super::CACHE_DIR;

/// Create the data directory with empty tables and a default config.
pub fn run_init(dir: &Path) -> Result<()> {
    if dir.join("config.yml").exists() {
        eprintln!("rolegraph: {} already exists", dir.display());
        return Ok(());
    }

    JsonlStore::new(dir.to_path_buf()).init()?;
    fs::create_dir_all(dir.join(CACHE_DIR))?;
    fs::write(dir.join("config.yml"), EngineConfig::default().to_yaml()?)?;
    fs::write(dir.join(".gitignore"), format!("{}/\n", CACHE_DIR))?;

    eprintln!("rolegraph: initialized {}", dir.display());
    Ok(())
}
