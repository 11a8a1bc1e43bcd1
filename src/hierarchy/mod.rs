pub mod closure;

pub use closure::{children_closure, ChildrenList, Closure};

use crate::error::{RbacError, Result};
use crate::item::Item;
use crate::storage::Store;

/// Whether adding `parent -> child` would close a loop: does `parent`
/// already appear at or below `child`?
pub fn detect_loop(store: &dyn Store, parent: &str, child: &str, max_depth: usize) -> Result<bool> {
    detect_loop_from(store, parent, child, 0, max_depth)
}

fn detect_loop_from(
    store: &dyn Store,
    parent: &str,
    node: &str,
    depth: usize,
    max_depth: usize,
) -> Result<bool> {
    if node == parent {
        return Ok(true);
    }
    if depth > max_depth {
        return Err(RbacError::DepthExceeded {
            name: node.to_string(),
            max_depth,
        });
    }
    for (grandchild, _) in store.get_direct_children(node)? {
        if detect_loop_from(store, parent, &grandchild, depth + 1, max_depth)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Check an edge before it is written. Each rejection has its own error so
/// callers can tell self-reference, type mismatch and loops apart.
pub fn validate_child(store: &dyn Store, parent: &Item, child: &Item, max_depth: usize) -> Result<()> {
    if parent.name == child.name {
        return Err(RbacError::SelfReference {
            name: parent.name.clone(),
        });
    }
    if !parent.kind.can_parent(child.kind) {
        return Err(RbacError::PermissionParent {
            parent: parent.name.clone(),
            child: child.name.clone(),
        });
    }
    if detect_loop(store, &parent.name, &child.name, max_depth)? {
        return Err(RbacError::LoopDetected {
            parent: parent.name.clone(),
            child: child.name.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Edge;
    use crate::storage::memory::MemoryStore;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store.insert_item(&Item::role(name)).unwrap();
        }
        store.insert_item(&Item::permission("p")).unwrap();
        store.insert_edge(&Edge::new("a", "b", true)).unwrap();
        store.insert_edge(&Edge::new("b", "c", true)).unwrap();
        store
    }

    #[test]
    fn loop_found_through_descendants() {
        let store = store();
        assert!(detect_loop(&store, "c", "a", 10).unwrap());
        assert!(detect_loop(&store, "b", "a", 10).unwrap());
        assert!(!detect_loop(&store, "a", "c", 10).unwrap());
    }

    #[test]
    fn validate_reports_each_cause() {
        let store = store();
        let a = Item::role("a");
        let c = Item::role("c");
        let p = Item::permission("p");

        assert!(matches!(
            validate_child(&store, &a, &a, 10),
            Err(RbacError::SelfReference { .. })
        ));
        assert!(matches!(
            validate_child(&store, &p, &a, 10),
            Err(RbacError::PermissionParent { .. })
        ));
        assert!(matches!(
            validate_child(&store, &c, &a, 10),
            Err(RbacError::LoopDetected { .. })
        ));
        assert!(validate_child(&store, &a, &p, 10).is_ok());
    }

    #[test]
    fn permission_may_parent_permission() {
        let store = store();
        store.insert_item(&Item::permission("q")).unwrap();
        assert!(validate_child(&store, &Item::permission("p"), &Item::permission("q"), 10).is_ok());
    }
}
