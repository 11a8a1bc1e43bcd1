use std::fs;
use std::path::PathBuf;

use crate::error::{RbacError, Result};

use super::{CacheBackend, GraphSnapshot};

/// Snapshot per key as a JSON file, shared by every process using the
/// same directory. A `<key>.gen` sidecar holds the snapshot's generation so
/// holders can revalidate without parsing the whole graph.
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Validate that a cache key doesn't contain path traversal characters.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(RbacError::Cache {
                reason: format!(
                    "invalid cache key '{}': must be non-empty and not contain '/', '\\', or '..'",
                    key
                ),
            });
        }
        Ok(())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    fn generation_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.gen"))
    }
}

impl CacheBackend for FileCache {
    fn get(&self, key: &str) -> Result<Option<GraphSnapshot>> {
        Self::validate_key(key)?;
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|e| RbacError::Cache {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                // treated as a miss; the next load overwrites it
                tracing::warn!("ignoring unreadable cache file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, snapshot: &GraphSnapshot) -> Result<()> {
        Self::validate_key(key)?;
        fs::create_dir_all(&self.cache_dir)?;
        let path = self.path(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec(snapshot)?)?;
        fs::rename(&tmp_path, &path).map_err(|e| RbacError::Cache {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;

        let gen_path = self.generation_path(key);
        let gen_tmp = gen_path.with_extension("gen.tmp");
        fs::write(&gen_tmp, snapshot.generation.to_string())?;
        fs::rename(&gen_tmp, &gen_path).map_err(|e| RbacError::Cache {
            reason: format!("failed to write {}: {}", gen_path.display(), e),
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        Self::validate_key(key)?;
        // snapshot first, so nobody can load it once the stamp is gone
        for path in [self.path(key), self.generation_path(key)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn generation(&self, key: &str) -> Result<Option<u64>> {
        Self::validate_key(key)?;
        let path = self.generation_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).map_err(|e| RbacError::Cache {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        match data.trim().parse() {
            Ok(generation) => Ok(Some(generation)),
            Err(e) => {
                tracing::warn!("ignoring unreadable cache stamp {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_delete() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().join("cache"));

        let mut snapshot = GraphSnapshot::default();
        snapshot
            .items
            .insert("admin".into(), Item::role("admin"));
        snapshot
            .parents
            .insert("admin".into(), vec![("delete".into(), false)]);
        cache.set("rbac", &snapshot).unwrap();

        assert_eq!(cache.get("rbac").unwrap(), Some(snapshot));

        cache.delete("rbac").unwrap();
        assert!(cache.get("rbac").unwrap().is_none());
        cache.delete("rbac").unwrap();
    }

    #[test]
    fn test_generation_sidecar() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf());
        assert_eq!(cache.generation("rbac").unwrap(), None);

        let snapshot = GraphSnapshot {
            generation: 42,
            ..GraphSnapshot::default()
        };
        cache.set("rbac", &snapshot).unwrap();
        assert_eq!(cache.generation("rbac").unwrap(), Some(42));
        assert!(tmp.path().join("rbac.gen").exists());

        cache.delete("rbac").unwrap();
        assert_eq!(cache.generation("rbac").unwrap(), None);
        assert!(!tmp.path().join("rbac.gen").exists());
    }

    #[test]
    fn test_corrupt_stamp_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf());
        fs::write(tmp.path().join("rbac.gen"), b"not-a-number").unwrap();
        assert_eq!(cache.generation("rbac").unwrap(), None);
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf());
        assert!(cache.get("../etc").is_err());
        assert!(cache.set("a/b", &GraphSnapshot::default()).is_err());
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf());
        fs::write(tmp.path().join("rbac.json"), b"{broken").unwrap();
        assert!(cache.get("rbac").unwrap().is_none());
    }
}
