//! Cached song-id lists for previously run queries.
//!
//! All cached queries live in a single map stored under [`QUERY_MAP_KEY`] in
//! every tier. Adding or removing an entry is a read-modify-write of the
//! whole map; concurrent writers may lose each other's entries, which costs
//! a re-run of the query and nothing else.

use super::tier::{get_json, set_json, CacheError, CacheTier, CacheType};
use crate::library_store::SongId;
use crate::query::SongQuery;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const QUERY_MAP_KEY: &str = "queries";

/// A query together with the ids that matched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQuery {
    pub query: SongQuery,
    pub ids: Vec<SongId>,
}

/// Query hash to cached result.
pub type QueryMap = HashMap<String, CachedQuery>;

/// Result of a modification of a [`QueryMap`]. Unmodified maps are not written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapUpdate {
    Modified,
    Unmodified,
}

pub struct QueryCache {
    tiers: Vec<Arc<dyn CacheTier>>,
}

impl QueryCache {
    /// `tiers` should be ordered fastest first.
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn tiers(&self) -> &[Arc<dyn CacheTier>] {
        &self.tiers
    }

    pub fn is_enabled(&self) -> bool {
        !self.tiers.is_empty()
    }

    /// Looks up the cached ids for `query`, trying each tier in order.
    ///
    /// Cache errors are logged and treated as misses. A hit in a slower tier
    /// is not copied into faster ones.
    pub fn lookup(&self, query: &SongQuery) -> Option<Vec<SongId>> {
        if !query.can_cache() {
            return None;
        }
        let hash = query.hash();
        for tier in &self.tiers {
            match get_json::<QueryMap>(tier.as_ref(), QUERY_MAP_KEY) {
                Ok(Some(mut map)) => {
                    if let Some(cached) = map.remove(&hash) {
                        debug!(
                            "Query {} hit in {} tier ({} ids)",
                            hash,
                            tier.kind(),
                            cached.ids.len()
                        );
                        return Some(cached.ids);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read query map from {} tier: {}", tier.kind(), e),
            }
        }
        None
    }

    /// Loads the map from the first tier that has one, or an empty map.
    fn load_map(&self) -> QueryMap {
        for tier in &self.tiers {
            match get_json::<QueryMap>(tier.as_ref(), QUERY_MAP_KEY) {
                Ok(Some(map)) => return map,
                Ok(None) => {}
                Err(e) => warn!("Failed to read query map from {} tier: {}", tier.kind(), e),
            }
        }
        QueryMap::new()
    }

    /// Records `ids` as the result of `query` in every tier. Failures are logged.
    pub fn store(&self, query: &SongQuery, ids: &[SongId]) {
        if !query.can_cache() || self.tiers.is_empty() {
            return;
        }
        let mut map = self.load_map();
        map.insert(
            query.hash(),
            CachedQuery {
                query: query.clone(),
                ids: ids.to_vec(),
            },
        );
        for tier in &self.tiers {
            if let Err(e) = set_json(tier.as_ref(), QUERY_MAP_KEY, &map, None) {
                warn!("Failed to store query map in {} tier: {}", tier.kind(), e);
            }
        }
    }

    /// Applies `f` to the map held by one tier, writing it back only when `f`
    /// reports a modification. A tier with no map is treated as empty.
    pub fn update_map<F>(tier: &dyn CacheTier, f: F) -> Result<MapUpdate, CacheError>
    where
        F: FnOnce(&mut QueryMap) -> MapUpdate,
    {
        let mut map = get_json::<QueryMap>(tier, QUERY_MAP_KEY)?.unwrap_or_default();
        let result = f(&mut map);
        if result == MapUpdate::Modified {
            set_json(tier, QUERY_MAP_KEY, &map, None)?;
        }
        Ok(result)
    }

    /// Drops the query map from every tier, or only from `only`.
    pub fn flush(&self, only: Option<CacheType>) -> Result<(), CacheError> {
        let mut first_err = None;
        for tier in self.tiers.iter().filter(|t| only.map_or(true, |k| t.kind() == k)) {
            if let Err(e) = tier.delete(QUERY_MAP_KEY) {
                warn!("Failed to flush query map from {} tier: {}", tier.kind(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheTier, SqliteCacheTier};

    fn tiers() -> (Arc<MemoryCacheTier>, Arc<SqliteCacheTier>) {
        (
            Arc::new(MemoryCacheTier::new(16)),
            Arc::new(SqliteCacheTier::in_memory().unwrap()),
        )
    }

    fn tier_list(fast: &Arc<MemoryCacheTier>, durable: &Arc<SqliteCacheTier>) -> Vec<Arc<dyn CacheTier>> {
        vec![fast.clone() as Arc<dyn CacheTier>, durable.clone()]
    }

    fn rock_query() -> SongQuery {
        SongQuery {
            tags: vec!["rock".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_store_then_lookup() {
        let (fast, durable) = tiers();
        let cache = QueryCache::new(tier_list(&fast, &durable));
        assert_eq!(cache.lookup(&rock_query()), None);

        cache.store(&rock_query(), &[1, 2, 3]);
        assert_eq!(cache.lookup(&rock_query()), Some(vec![1, 2, 3]));

        let shuffled = SongQuery {
            shuffle: true,
            ..rock_query()
        };
        assert_eq!(cache.lookup(&shuffled), Some(vec![1, 2, 3]));
        assert!(fast.get(QUERY_MAP_KEY).unwrap().is_some());
        assert!(durable.get(QUERY_MAP_KEY).unwrap().is_some());
    }

    #[test]
    fn test_lookup_ignores_tag_order() {
        let (fast, durable) = tiers();
        let cache = QueryCache::new(tier_list(&fast, &durable));
        let query = |tags: &[&str]| SongQuery {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        cache.store(&query(&["rock", "live"]), &[4, 5]);
        assert_eq!(cache.lookup(&query(&["live", "rock"])), Some(vec![4, 5]));
    }

    #[test]
    fn test_durable_hit_does_not_repopulate_fast_tier() {
        let (fast, durable) = tiers();
        let cache = QueryCache::new(tier_list(&fast, &durable));
        cache.store(&rock_query(), &[7]);
        fast.flush().unwrap();

        assert_eq!(cache.lookup(&rock_query()), Some(vec![7]));
        assert!(fast.get(QUERY_MAP_KEY).unwrap().is_none());
    }

    #[test]
    fn test_uncacheable_query_is_never_stored() {
        let (fast, durable) = tiers();
        let cache = QueryCache::new(tier_list(&fast, &durable));
        let query = SongQuery {
            max_plays: Some(2),
            ..Default::default()
        };
        cache.store(&query, &[1]);
        assert_eq!(cache.lookup(&query), None);
        assert!(fast.get(QUERY_MAP_KEY).unwrap().is_none());
    }

    #[test]
    fn test_store_keeps_existing_entries() {
        let (fast, durable) = tiers();
        let cache = QueryCache::new(tier_list(&fast, &durable));
        let jazz = SongQuery {
            tags: vec!["jazz".to_string()],
            ..Default::default()
        };
        cache.store(&rock_query(), &[1]);
        cache.store(&jazz, &[2]);
        assert_eq!(cache.lookup(&rock_query()), Some(vec![1]));
        assert_eq!(cache.lookup(&jazz), Some(vec![2]));
    }

    #[test]
    fn test_update_map_skips_write_when_unmodified() {
        let (fast, _) = tiers();
        let result = QueryCache::update_map(fast.as_ref(), |_| MapUpdate::Unmodified).unwrap();
        assert_eq!(result, MapUpdate::Unmodified);
        assert!(fast.get(QUERY_MAP_KEY).unwrap().is_none());

        let result = QueryCache::update_map(fast.as_ref(), |map| {
            map.insert(
                "h".to_string(),
                CachedQuery {
                    query: rock_query(),
                    ids: vec![],
                },
            );
            MapUpdate::Modified
        })
        .unwrap();
        assert_eq!(result, MapUpdate::Modified);
        assert!(fast.get(QUERY_MAP_KEY).unwrap().is_some());
    }

    #[test]
    fn test_flush_single_tier() {
        let (fast, durable) = tiers();
        let cache = QueryCache::new(tier_list(&fast, &durable));
        cache.store(&rock_query(), &[1]);
        cache.flush(Some(CacheType::Fast)).unwrap();
        assert!(fast.get(QUERY_MAP_KEY).unwrap().is_none());
        assert!(durable.get(QUERY_MAP_KEY).unwrap().is_some());
        cache.flush(None).unwrap();
        assert_eq!(cache.lookup(&rock_query()), None);
    }
}
