//! The cached and direct walks must agree on every graph.

use std::sync::Arc;

use proptest::prelude::*;
use rolegraph::cache::memory::MemoryCache;
use rolegraph::cache::CacheState;
use rolegraph::config::EngineConfig;
use rolegraph::item::{Item, Params, Rule};
use rolegraph::rule::MATCH_PARAMS;
use rolegraph::storage::memory::MemoryStore;
use rolegraph::Manager;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Graph {
    size: usize,
    roles: usize,
    edges: Vec<(usize, usize, bool)>,
    assigned: Vec<usize>,
    gated: Vec<bool>,
}

fn graph() -> impl Strategy<Value = Graph> {
    (2usize..9, 0usize..9).prop_flat_map(|(size, roles)| {
        (
            Just(size),
            Just(roles.min(size)),
            prop::collection::vec((0..size, 0..size, any::<bool>()), 0..20),
            prop::collection::vec(0..size, 0..4),
            prop::collection::vec(any::<bool>(), size),
        )
            .prop_map(|(size, roles, edges, assigned, gated)| Graph {
                size,
                roles,
                edges,
                assigned,
                gated,
            })
    })
}

fn name(i: usize) -> String {
    format!("n{i}")
}

/// Items below `roles` are roles, the rest permissions. Edges only point
/// from a lower to a higher index, so the graph is acyclic and no
/// permission ever parents a role.
fn build(g: &Graph, manager: &Manager) {
    manager
        .add_rule(Rule::new("flagged", MATCH_PARAMS).with_data(json!({"flag": true})))
        .unwrap();
    for i in 0..g.size {
        let mut item = if i < g.roles {
            Item::role(name(i))
        } else {
            Item::permission(name(i))
        };
        if g.gated[i] {
            item = item.with_rule("flagged");
        }
        manager.add_item(item).unwrap();
    }
    for &(a, b, allow) in &g.edges {
        let (parent, child) = (a.min(b), a.max(b));
        if parent == child || manager.has_child(&name(parent), &name(child)).unwrap() {
            continue;
        }
        manager.add_child(&name(parent), &name(child), allow).unwrap();
    }
    for &i in &g.assigned {
        manager.assign(&name(i), "u").unwrap();
    }
}

proptest! {
    #[test]
    fn prop_warm_and_direct_agree(g in graph(), flag in any::<bool>()) {
        let warm = Manager::new(Arc::new(MemoryStore::new()), EngineConfig::default())
            .with_cache_backend(Arc::new(MemoryCache::new()));
        let direct = Manager::new(Arc::new(MemoryStore::new()), EngineConfig::default());
        build(&g, &warm);
        build(&g, &direct);
        warm.load_cache().unwrap();
        prop_assert_eq!(warm.cache_state(), CacheState::Warm);
        prop_assert_eq!(direct.cache_state(), CacheState::Disabled);

        let mut params = Params::new();
        params.insert("flag".into(), Value::Bool(flag));

        for i in 0..g.size {
            let target = name(i);
            let cached = warm.explain_access("u", &target, &params).unwrap();
            let walked = direct.explain_access("u", &target, &params).unwrap();
            prop_assert_eq!(cached, walked, "target {}", target);
        }
    }

    #[test]
    fn prop_assigned_ungated_items_granted(g in graph()) {
        let manager = Manager::new(Arc::new(MemoryStore::new()), EngineConfig::default());
        build(&g, &manager);
        for &i in &g.assigned {
            if !g.gated[i] {
                prop_assert!(manager.check_access("u", &name(i), &Params::new()).unwrap());
            }
        }
    }
}
