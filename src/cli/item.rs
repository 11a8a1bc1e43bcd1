use std::path::Path;

use serde_json::Value;

use crate::error::{RbacError, Result};
use crate::item::{Item, ItemKind, Rule};

/// Add a permission, role or custom role.
pub fn run_add_item(
    dir: &Path,
    kind: &str,
    name: &str,
    description: Option<&str>,
    rule: Option<&str>,
) -> Result<()> {
    let kind = kind
        .parse::<ItemKind>()
        .map_err(|reason| RbacError::InvalidInput { reason })?;

    let mut item = Item::new(name, kind);
    if let Some(description) = description {
        item = item.with_description(description);
    }
    if let Some(rule) = rule {
        item = item.with_rule(rule);
    }

    super::open(dir)?.add_item(item)?;
    eprintln!("rolegraph: added {} '{}'", kind, name);
    Ok(())
}

pub fn run_remove_item(dir: &Path, name: &str) -> Result<()> {
    if super::open(dir)?.remove_item(name)? {
        eprintln!("rolegraph: removed '{}'", name);
    } else {
        eprintln!("rolegraph: no item named '{}'", name);
    }
    Ok(())
}

/// Add a rule of a registered kind. `data` is a JSON document.
pub fn run_add_rule(dir: &Path, name: &str, kind: &str, data: Option<&str>) -> Result<()> {
    let mut rule = Rule::new(name, kind);
    if let Some(data) = data {
        rule = rule.with_data(serde_json::from_str::<Value>(data)?);
    }
    super::open(dir)?.add_rule(rule)?;
    eprintln!("rolegraph: added rule '{}' ({})", name, kind);
    Ok(())
}

pub fn run_remove_rule(dir: &Path, name: &str) -> Result<()> {
    if super::open(dir)?.remove_rule(name)? {
        eprintln!("rolegraph: removed rule '{}'", name);
    } else {
        eprintln!("rolegraph: no rule named '{}'", name);
    }
    Ok(())
}
