use std::path::Path;

use crate::error::Result;

pub fn run_add_child(dir: &Path, parent: &str, child: &str, deny: bool) -> Result<()> {
    super::open(dir)?.add_child(parent, child, !deny)?;
    eprintln!(
        "rolegraph: '{}' is now a child of '{}'{}",
        child,
        parent,
        if deny { " (deny)" } else { "" }
    );
    Ok(())
}

pub fn run_remove_child(dir: &Path, parent: &str, child: &str) -> Result<()> {
    if super::open(dir)?.remove_child(parent, child)? {
        eprintln!("rolegraph: removed '{}' from '{}'", child, parent);
    } else {
        eprintln!("rolegraph: '{}' is not a child of '{}'", child, parent);
    }
    Ok(())
}

/// List direct children, one per line: `<kind>\t<name>\t<allow|deny>`.
pub fn run_children(dir: &Path, name: &str) -> Result<()> {
    let children = super::open(dir)?.get_children(name)?;
    for child in &children {
        println!(
            "{}\t{}\t{}",
            child.item.kind,
            child.item.name,
            if child.allow { "allow" } else { "deny" }
        );
    }
    Ok(())
}
