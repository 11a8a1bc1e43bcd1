use std::path::Path;

use crate::error::Result;

/// Print `allow` or `deny`. Both are a successful run.
pub fn run_check(dir: &Path, user: &str, item: &str, params: &[String]) -> Result<()> {
    let params = super::parse_params(params)?;
    let allowed = super::open(dir)?.check_access(user, item, &params)?;
    println!("{}", if allowed { "allow" } else { "deny" });
    Ok(())
}

/// Permissions below a role, or inherited by a user with their flag.
pub fn run_permissions(dir: &Path, role: Option<&str>, user: Option<&str>) -> Result<()> {
    let manager = super::open(dir)?;
    match (role, user) {
        (Some(role), _) => {
            for name in manager.get_permissions_by_role(role)?.keys() {
                println!("{}", name);
            }
        }
        (None, Some(user)) => {
            for (name, child) in manager.get_permissions_by_user(user)? {
                println!("{}\t{}", name, if child.allow { "allow" } else { "deny" });
            }
        }
        (None, None) => {
            eprintln!("rolegraph: must specify --role or --user");
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Roles held by a user, default roles included.
pub fn run_roles(dir: &Path, user: &str) -> Result<()> {
    for (name, role) in super::open(dir)?.get_roles_by_user(user)? {
        println!("{}\t{}", role.kind, name);
    }
    Ok(())
}

pub fn run_users(dir: &Path, item: &str) -> Result<()> {
    for user in super::open(dir)?.get_user_ids_by_role(item)? {
        println!("{}", user);
    }
    Ok(())
}
