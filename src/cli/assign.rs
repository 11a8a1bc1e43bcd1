use std::path::Path;

use crate::error::Result;

pub fn run_assign(dir: &Path, user: &str, item: &str) -> Result<()> {
    super::open(dir)?.assign(item, user)?;
    eprintln!("rolegraph: assigned '{}' to user '{}'", item, user);
    Ok(())
}

pub fn run_revoke(dir: &Path, user: &str, item: &str) -> Result<()> {
    if super::open(dir)?.revoke(item, user)? {
        eprintln!("rolegraph: revoked '{}' from user '{}'", item, user);
    } else {
        eprintln!("rolegraph: user '{}' does not hold '{}'", user, item);
    }
    Ok(())
}

pub fn run_revoke_all(dir: &Path, user: &str) -> Result<()> {
    if super::open(dir)?.revoke_all(user)? {
        eprintln!("rolegraph: revoked all assignments of user '{}'", user);
    } else {
        eprintln!("rolegraph: user '{}' has no assignments", user);
    }
    Ok(())
}
