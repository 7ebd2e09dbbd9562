use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::hash::Hash;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datanet_abstract::{PhysicalPathMatrix, RoutingMatrix, Topology};
use serde::Serialize;
use tracing::debug;

use crate::error::{DatanetError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub decodes: u64,
    pub hits: u64,
}

impl AddAssign for CacheStats {
    fn add_assign(&mut self, other: Self) {
        self.decodes += other.decodes;
        self.hits += other.hits;
    }
}

/// Decoded artifacts keyed by normalized path. Failed decodes are never
/// stored, so the next request retries.
#[derive(Debug)]
pub struct ArtifactCache<K, V> {
    entries: HashMap<K, Arc<V>>,
    stats: CacheStats,
}

impl<K, V> Default for ArtifactCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<K: Eq + Hash + Debug, V> ArtifactCache<K, V> {
    /// Returns the cached value for `key`, running `decode` on a miss.
    pub fn get_or_try_decode<F>(&mut self, key: K, decode: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.entries.get(&key) {
            self.stats.hits += 1;
            debug!("cache hit for {:?}", key);
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(decode()?);
        self.stats.decodes += 1;
        debug!("decoded {:?}", key);
        self.entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Canonical form of an artifact path, used as the cache key.
pub fn normalize(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| DatanetError::artifact_io(path, e))
}

/// Key of a physical path matrix: every file that shapes its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalPathKey {
    pub routing: PathBuf,
    pub l2: PathBuf,
    pub tg: PathBuf,
}

#[derive(Debug, Default)]
pub struct TopologyCache {
    pub graphs: ArtifactCache<PathBuf, Topology>,
    pub routings: ArtifactCache<PathBuf, RoutingMatrix>,
    pub physical_paths: ArtifactCache<PhysicalPathKey, PhysicalPathMatrix>,
}

impl TopologyCache {
    pub fn stats(&self) -> CacheStats {
        let mut total = self.graphs.stats();
        total += self.routings.stats();
        total += self.physical_paths.stats();
        total
    }

    pub fn clear(&mut self) {
        debug!(
            "dropping {} graphs, {} routings, {} physical path sets",
            self.graphs.len(),
            self.routings.len(),
            self.physical_paths.len()
        );
        self.graphs.clear();
        self.routings.clear();
        self.physical_paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::decode_routing;

    #[test]
    fn same_routing_decodes_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("routing.txt");
        fs::write(&file, "0 1 2\n2 1 0\n").unwrap();

        let mut cache = TopologyCache::default();
        let load = |cache: &mut TopologyCache| {
            let key = normalize(&file).unwrap();
            cache
                .routings
                .get_or_try_decode(key, || {
                    let text = fs::read_to_string(&file).unwrap();
                    decode_routing(&text, 3, false)
                })
                .unwrap()
        };
        let first = load(&mut cache);
        let second = load(&mut cache);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { decodes: 1, hits: 1 });
    }

    #[test]
    fn failed_decode_is_not_cached() {
        let mut cache: ArtifactCache<&str, u32> = ArtifactCache::default();
        let err =
            cache.get_or_try_decode("graph", || Err(DatanetError::structural("graph", "bad")));
        assert!(err.is_err());
        assert!(cache.is_empty());

        let value = cache.get_or_try_decode("graph", || Ok(7)).unwrap();
        assert_eq!(*value, 7);
        assert_eq!(cache.stats().decodes, 1);
    }

    #[test]
    fn normalize_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = normalize(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, DatanetError::MissingArtifact { .. }));
    }
}
