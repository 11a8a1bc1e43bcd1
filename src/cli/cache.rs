use std::path::Path;

use crate::error::Result;

pub fn run_warm(dir: &Path) -> Result<()> {
    let manager = super::open(dir)?;
    manager.load_cache()?;
    eprintln!("rolegraph: graph cache {}", manager.cache_state());
    Ok(())
}

pub fn run_invalidate(dir: &Path) -> Result<()> {
    super::open(dir)?.invalidate_cache()?;
    eprintln!("rolegraph: graph cache invalidated");
    Ok(())
}

/// Print `disabled`, `cold` or `warm` without building a snapshot.
pub fn run_status(dir: &Path) -> Result<()> {
    println!("{}", super::open(dir)?.shared_cache_state()?);
    Ok(())
}
