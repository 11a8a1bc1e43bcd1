pub mod file;
pub mod memory;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::{Item, Rule};
use crate::storage::Store;

/// The whole authorization graph, loaded at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Stamp set when the snapshot is built from the store. A holder whose
    /// stamp no longer matches the backend's is stale.
    #[serde(default)]
    pub generation: u64,
    /// Items by name.
    pub items: HashMap<String, Item>,
    /// Rules by name.
    pub rules: HashMap<String, Rule>,
    /// Parent name -> ordered (child, allow).
    pub parents: HashMap<String, Vec<(String, bool)>>,
}

impl GraphSnapshot {
    /// Bulk-load from the store. Edges whose child is not a known item are dropped.
    pub fn load(store: &dyn Store) -> Result<Self> {
        let items: HashMap<String, Item> = store
            .get_all_items()?
            .into_iter()
            .map(|i| (i.name.clone(), i))
            .collect();
        let rules: HashMap<String, Rule> = store
            .get_rules()?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut parents: HashMap<String, Vec<(String, bool)>> = HashMap::new();
        for edge in store.get_all_edges()? {
            if !items.contains_key(&edge.child) {
                continue;
            }
            let children = parents.entry(edge.parent).or_default();
            match children.iter_mut().find(|(c, _)| *c == edge.child) {
                Some(slot) => slot.1 = edge.allow,
                None => children.push((edge.child, edge.allow)),
            }
        }

        Ok(Self {
            generation: next_generation(),
            items,
            rules,
            parents,
        })
    }

    pub fn children_of(&self, name: &str) -> Option<&[(String, bool)]> {
        self.parents.get(name).map(Vec::as_slice)
    }
}

/// Wall-clock nanoseconds, forced strictly increasing within the process.
fn next_generation() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = Utc::now()
        .timestamp_nanos_opt()
        .map_or(0, |n| n.max(0) as u64);
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Backend the snapshot is shared through.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<GraphSnapshot>>;

    fn set(&self, key: &str, snapshot: &GraphSnapshot) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Generation of the snapshot stored under `key`, without loading it.
    fn generation(&self, key: &str) -> Result<Option<u64>>;
}

/// Whether a snapshot is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No backend configured; every check walks the store.
    Disabled,
    Cold,
    Warm,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheState::Disabled => write!(f, "disabled"),
            CacheState::Cold => write!(f, "cold"),
            CacheState::Warm => write!(f, "warm"),
        }
    }
}

/// Cache counters for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Snapshots built from the store.
    pub store_loads: u64,
    /// Snapshots taken from the backend.
    pub backend_hits: u64,
    pub invalidations: u64,
}

/// Graph snapshot holder. Either fully populated or absent.
///
/// Share one instance between managers with `Manager::with_cache`. Holders
/// that only share a backend stay coherent too: a held snapshot is served
/// only while the backend still carries the same generation.
pub struct GraphCache {
    backend: Option<Arc<dyn CacheBackend>>,
    key: String,
    local: RwLock<Option<Arc<GraphSnapshot>>>,
    store_loads: AtomicU64,
    backend_hits: AtomicU64,
    invalidations: AtomicU64,
}

impl GraphCache {
    pub fn new(backend: Arc<dyn CacheBackend>, key: impl Into<String>) -> Self {
        Self::build(Some(backend), key.into())
    }

    /// A cache that never warms.
    pub fn disabled() -> Self {
        Self::build(None, String::new())
    }

    fn build(backend: Option<Arc<dyn CacheBackend>>, key: String) -> Self {
        Self {
            backend,
            key,
            local: RwLock::new(None),
            store_loads: AtomicU64::new(0),
            backend_hits: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// State of the locally held snapshot.
    pub fn state(&self) -> CacheState {
        if self.backend.is_none() {
            return CacheState::Disabled;
        }
        let guard = self.local.read().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            CacheState::Warm
        } else {
            CacheState::Cold
        }
    }

    /// Warm when a current snapshot is held here or the backend already
    /// carries one another holder wrote.
    pub fn shared_state(&self) -> Result<CacheState> {
        let Some(backend) = &self.backend else {
            return Ok(CacheState::Disabled);
        };
        if self.snapshot()?.is_some() || backend.generation(&self.key)?.is_some() {
            return Ok(CacheState::Warm);
        }
        Ok(CacheState::Cold)
    }

    /// The held snapshot, if warm and still current in the backend. A
    /// snapshot the backend dropped or replaced is discarded here.
    pub fn snapshot(&self) -> Result<Option<Arc<GraphSnapshot>>> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        let Some(held) = self.held() else {
            return Ok(None);
        };
        if backend.generation(&self.key)? == Some(held.generation) {
            return Ok(Some(held));
        }

        let mut guard = self.local.write().unwrap_or_else(|e| e.into_inner());
        if guard
            .as_ref()
            .is_some_and(|s| s.generation == held.generation)
        {
            *guard = None;
        }
        tracing::debug!(key = %self.key, "graph cache superseded in backend");
        Ok(None)
    }

    fn held(&self) -> Option<Arc<GraphSnapshot>> {
        self.local
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Populate from the backend, or from the store when the backend has no
    /// snapshot. No-op when warm or disabled.
    pub fn load_if_cold(&self, store: &dyn Store) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        if self.snapshot()?.is_some() {
            return Ok(());
        }

        let snapshot = match backend.get(&self.key)? {
            Some(snapshot) => {
                self.backend_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %self.key, "graph cache loaded from backend");
                snapshot
            }
            None => {
                let snapshot = GraphSnapshot::load(store)?;
                backend.set(&self.key, &snapshot)?;
                self.store_loads.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    key = %self.key,
                    items = snapshot.items.len(),
                    rules = snapshot.rules.len(),
                    parents = snapshot.parents.len(),
                    "graph cache loaded from store"
                );
                snapshot
            }
        };

        let mut guard = self.local.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Drop the snapshot locally and in the backend.
    pub fn invalidate(&self) -> Result<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        {
            let mut guard = self.local.write().unwrap_or_else(|e| e.into_inner());
            *guard = None;
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %self.key, "graph cache invalidated");
        backend.delete(&self.key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            store_loads: self.store_loads.load(Ordering::Relaxed),
            backend_hits: self.backend_hits.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for GraphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCache")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}
