use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Result;

use super::{CacheBackend, GraphSnapshot};

/// In-process backend, shareable between `GraphCache` instances.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Arc<GraphSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<GraphSnapshot>> {
        Ok(self.entries.get(key).map(|e| e.value().as_ref().clone()))
    }

    fn set(&self, key: &str, snapshot: &GraphSnapshot) -> Result<()> {
        self.entries
            .insert(key.to_string(), Arc::new(snapshot.clone()));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn generation(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.entries.get(key).map(|e| e.generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_follows_the_stored_snapshot() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.generation("k").unwrap(), None);

        let snapshot = GraphSnapshot {
            generation: 7,
            ..GraphSnapshot::default()
        };
        cache.set("k", &snapshot).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.generation("k").unwrap(), Some(7));

        cache.delete("k").unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.generation("k").unwrap(), None);
    }
}
