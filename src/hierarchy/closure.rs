use std::collections::HashMap;

use crate::error::{RbacError, Result};
use crate::item::Assignments;
use crate::storage::Store;

/// Every descendant reached, with its effective allow flag.
pub type Closure = Assignments;

/// Whole parent -> children adjacency, loaded in one pass.
#[derive(Debug, Clone, Default)]
pub struct ChildrenList {
    parents: HashMap<String, Vec<(String, bool)>>,
}

impl ChildrenList {
    pub fn load(store: &dyn Store) -> Result<Self> {
        let mut parents: HashMap<String, Vec<(String, bool)>> = HashMap::new();
        for edge in store.get_all_edges()? {
            parents
                .entry(edge.parent)
                .or_default()
                .push((edge.child, edge.allow));
        }
        Ok(Self { parents })
    }

    pub fn children(&self, name: &str) -> &[(String, bool)] {
        self.parents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Expand `root` depth-first into `result`.
///
/// A descendant's flag is its edge's allow ANDed with the flag its parent
/// was recorded with (the root counts as allowed). The first time a name is
/// reached decides its flag; later paths never overwrite it.
pub fn children_closure(
    root: &str,
    list: &ChildrenList,
    result: &mut Closure,
    max_depth: usize,
) -> Result<()> {
    expand(root, true, list, result, 0, max_depth)
}

fn expand(
    name: &str,
    inherited: bool,
    list: &ChildrenList,
    result: &mut Closure,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    if depth > max_depth {
        return Err(RbacError::DepthExceeded {
            name: name.to_string(),
            max_depth,
        });
    }
    for (child, allow) in list.children(name) {
        if result.contains(child) {
            continue;
        }
        let flag = inherited && *allow;
        result.insert(child.clone(), flag);
        expand(child, flag, list, result, depth + 1, max_depth)?;
    }
    Ok(())
}
