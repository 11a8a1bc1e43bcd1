//! Access resolution.
//!
//! A single recursive walk answers "does some chain from the user's
//! assignments reach the target, and with what outcome". The walk is
//! parameterized by a [`ChildSource`]: [`SnapshotSource`] reads a warm
//! [`GraphSnapshot`], [`StoreSource`] queries the store one level at a time.
//! Both must produce identical results for the same data.

use serde_json::Value;

use crate::cache::GraphSnapshot;
use crate::error::{RbacError, Result};
use crate::item::{Assignments, Item, Params, Rule, ALLOW_PARAM};
use crate::rule::{execute_item_rule, RuleExecutor, UnsetRule};
use crate::storage::Store;

/// Outcome of a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Net allow flag of the matching chain.
    pub allow: bool,
    /// Whether any chain reached the target at all.
    pub matched: bool,
}

impl Resolution {
    const UNMATCHED: Resolution = Resolution {
        allow: false,
        matched: false,
    };

    pub fn granted(&self) -> bool {
        self.allow && self.matched
    }
}

/// Where the walk gets children and rules from.
pub trait ChildSource {
    /// Children of `name` as an assignment set, or `None` when there is
    /// nothing below it to walk.
    fn children_of(&self, name: &str) -> Result<Option<Assignments>>;

    fn rule(&self, name: &str) -> Result<Option<Rule>>;
}

/// Reads from a warm snapshot.
pub struct SnapshotSource<'a> {
    snapshot: &'a GraphSnapshot,
}

impl<'a> SnapshotSource<'a> {
    pub fn new(snapshot: &'a GraphSnapshot) -> Self {
        Self { snapshot }
    }
}

impl ChildSource for SnapshotSource<'_> {
    fn children_of(&self, name: &str) -> Result<Option<Assignments>> {
        Ok(self
            .snapshot
            .children_of(name)
            .filter(|children| !children.is_empty())
            .map(|children| children.iter().cloned().collect()))
    }

    fn rule(&self, name: &str) -> Result<Option<Rule>> {
        Ok(self.snapshot.rules.get(name).cloned())
    }
}

/// Issues an item lookup and a children query per level.
pub struct StoreSource<'a> {
    store: &'a dyn Store,
}

impl<'a> StoreSource<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }
}

impl ChildSource for StoreSource<'_> {
    fn children_of(&self, name: &str) -> Result<Option<Assignments>> {
        if self.store.get_item(name)?.is_none() {
            return Ok(None);
        }
        let children = self.store.get_direct_children(name)?;
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(children.into_iter().collect()))
    }

    fn rule(&self, name: &str) -> Result<Option<Rule>> {
        self.store.get_rule(name)
    }
}

/// Walks from assignments toward a target item.
pub struct AccessChecker<'a> {
    executor: &'a dyn RuleExecutor,
    max_depth: usize,
}

impl<'a> AccessChecker<'a> {
    pub fn new(executor: &'a dyn RuleExecutor, max_depth: usize) -> Self {
        Self {
            executor,
            max_depth,
        }
    }

    /// Resolve `item` for `user_id` starting from `assignments`.
    pub fn resolve<S: ChildSource>(
        &self,
        source: &S,
        user_id: &str,
        item: &Item,
        params: &Params,
        assignments: &Assignments,
    ) -> Result<Resolution> {
        self.walk(source, user_id, item, params, assignments, 0)
    }

    fn walk<S: ChildSource>(
        &self,
        source: &S,
        user_id: &str,
        item: &Item,
        params: &Params,
        assignments: &Assignments,
        depth: usize,
    ) -> Result<Resolution> {
        if depth > self.max_depth {
            return Err(RbacError::DepthExceeded {
                name: item.name.clone(),
                max_depth: self.max_depth,
            });
        }

        if let Some(allow) = assignments.get(&item.name) {
            let passed = execute_item_rule(
                self.executor,
                |name| source.rule(name),
                user_id,
                item,
                params,
                UnsetRule::InheritAllow,
            )?;
            return Ok(Resolution {
                allow: passed && allow,
                matched: true,
            });
        }

        for (name, allow) in assignments.iter() {
            let Some(children) = source.children_of(name)? else {
                continue;
            };
            let mut next = params.clone();
            next.insert(ALLOW_PARAM.to_string(), Value::Bool(allow));
            let found = self.walk(source, user_id, item, &next, &children, depth + 1)?;
            if found.matched {
                return Ok(found);
            }
        }

        Ok(Resolution::UNMATCHED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Edge;
    use crate::rule::{RuleRegistry, MATCH_PARAMS};
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    fn assigned(names: &[&str]) -> Assignments {
        names.iter().map(|n| (n.to_string(), true)).collect()
    }

    fn both(store: &MemoryStore, user: &str, target: &str, params: &Params, a: &Assignments) -> Resolution {
        let registry = RuleRegistry::with_builtins();
        let checker = AccessChecker::new(&registry, 16);
        let item = store.get_item(target).unwrap().unwrap();
        let direct = checker
            .resolve(&StoreSource::new(store), user, &item, params, a)
            .unwrap();
        let snapshot = GraphSnapshot::load(store).unwrap();
        let cached = checker
            .resolve(&SnapshotSource::new(&snapshot), user, &item, params, a)
            .unwrap();
        assert_eq!(direct, cached);
        direct
    }

    fn chain() -> MemoryStore {
        let store = MemoryStore::new();
        for item in [
            Item::role("admin"),
            Item::role("editor"),
            Item::permission("publish"),
            Item::permission("purge"),
        ] {
            store.insert_item(&item).unwrap();
        }
        store.insert_edge(&Edge::new("admin", "editor", true)).unwrap();
        store.insert_edge(&Edge::new("editor", "publish", true)).unwrap();
        store.insert_edge(&Edge::new("admin", "purge", false)).unwrap();
        store
    }

    #[test]
    fn direct_assignment_matches() {
        let store = chain();
        let r = both(&store, "1", "publish", &Params::new(), &assigned(&["publish"]));
        assert_eq!(r, Resolution { allow: true, matched: true });
    }

    #[test]
    fn inherited_through_two_levels() {
        let store = chain();
        let r = both(&store, "1", "publish", &Params::new(), &assigned(&["admin"]));
        assert!(r.granted());
    }

    #[test]
    fn denied_edge_matches_without_granting() {
        let store = chain();
        let r = both(&store, "1", "purge", &Params::new(), &assigned(&["admin"]));
        assert_eq!(r, Resolution { allow: false, matched: true });
    }

    #[test]
    fn unreachable_target_is_unmatched() {
        let store = chain();
        let r = both(&store, "1", "purge", &Params::new(), &assigned(&["editor"]));
        assert_eq!(r, Resolution::UNMATCHED);
    }

    #[test]
    fn first_matching_root_wins() {
        let store = chain();
        store.insert_item(&Item::role("auditor")).unwrap();
        store.insert_edge(&Edge::new("auditor", "purge", true)).unwrap();

        let deny_first = both(&store, "1", "purge", &Params::new(), &assigned(&["admin", "auditor"]));
        assert_eq!(deny_first, Resolution { allow: false, matched: true });

        let allow_first = both(&store, "1", "purge", &Params::new(), &assigned(&["auditor", "admin"]));
        assert!(allow_first.granted());
    }

    #[test]
    fn rule_veto_is_matched_deny() {
        let store = chain();
        store
            .insert_rule(&Rule::new("drafts", MATCH_PARAMS).with_data(json!({"status": "draft"})))
            .unwrap();
        let mut publish = store.get_item("publish").unwrap().unwrap();
        publish.rule_name = Some("drafts".into());
        store.update_item("publish", &publish).unwrap();

        let live = json!({"status": "live"}).as_object().cloned().unwrap();
        let r = both(&store, "1", "publish", &live, &assigned(&["admin"]));
        assert_eq!(r, Resolution { allow: false, matched: true });

        let draft = json!({"status": "draft"}).as_object().cloned().unwrap();
        assert!(both(&store, "1", "publish", &draft, &assigned(&["admin"])).granted());
    }

    #[test]
    fn cycle_hits_depth_bound() {
        let store = MemoryStore::new();
        store.insert_item(&Item::role("a")).unwrap();
        store.insert_item(&Item::role("b")).unwrap();
        store.insert_item(&Item::permission("p")).unwrap();
        // written straight to the store, bypassing loop detection
        store.insert_edge(&Edge::new("a", "b", true)).unwrap();
        store.insert_edge(&Edge::new("b", "a", true)).unwrap();

        let registry = RuleRegistry::new();
        let checker = AccessChecker::new(&registry, 8);
        let item = store.get_item("p").unwrap().unwrap();
        let err = checker
            .resolve(&StoreSource::new(&store), "1", &item, &Params::new(), &assigned(&["a"]))
            .unwrap_err();
        assert!(matches!(err, RbacError::DepthExceeded { max_depth: 8, .. }));
    }
}
