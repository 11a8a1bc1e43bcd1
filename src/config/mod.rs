pub mod engine;

pub use engine::*;

use std::path::{Path, PathBuf};

/// Default data directory, relative to the working directory: `.rolegraph/`
pub const DEFAULT_DIR: &str = ".rolegraph";

/// Resolve the data directory, falling back to `./.rolegraph`.
pub fn resolve_dir(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_DIR),
    }
}
