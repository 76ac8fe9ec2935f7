//! Per-song record cache, keyed by song id.

use super::tier::{CacheError, CacheTier};
use crate::library_store::{Song, SongId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub fn song_cache_key(id: SongId) -> String {
    format!("song-{}", id)
}

pub struct RecordCache {
    tiers: Vec<Arc<dyn CacheTier>>,
    expiry: Option<Duration>,
}

impl RecordCache {
    /// `tiers` should be ordered fastest first.
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>, expiry: Option<Duration>) -> Self {
        Self { tiers, expiry }
    }

    pub fn disabled() -> Self {
        Self {
            tiers: Vec::new(),
            expiry: None,
        }
    }

    pub fn tiers(&self) -> &[Arc<dyn CacheTier>] {
        &self.tiers
    }

    /// Returns the cached songs among `ids`. Each tier is only asked for the
    /// ids the previous tiers missed; hits are not copied to faster tiers.
    /// Errors are logged and count as misses.
    pub fn get_many(&self, ids: &[SongId]) -> HashMap<SongId, Song> {
        let mut found = HashMap::with_capacity(ids.len());
        for tier in &self.tiers {
            let remaining: Vec<SongId> = ids
                .iter()
                .copied()
                .filter(|id| !found.contains_key(id))
                .collect();
            if remaining.is_empty() {
                break;
            }
            let mut hits = 0;
            for id in remaining {
                let key = song_cache_key(id);
                let bytes = match tier.get(&key) {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Failed to read {} from {} tier: {}", key, tier.kind(), e);
                        continue;
                    }
                };
                match serde_json::from_slice::<Song>(&bytes) {
                    Ok(song) => {
                        found.insert(id, song);
                        hits += 1;
                    }
                    Err(e) => warn!("Dropping undecodable {} in {} tier: {}", key, tier.kind(), e),
                }
            }
            debug!("{} tier returned {} songs", tier.kind(), hits);
        }
        found
    }

    /// Adds each song to every tier unless already present.
    ///
    /// A key that is already present is left alone, or deleted when
    /// `evict_on_conflict` is set so that the next read goes to the store.
    /// Other failures don't stop the remaining writes; the first is returned.
    pub fn put_many(&self, songs: &[Song], evict_on_conflict: bool) -> Result<(), CacheError> {
        let mut first_err = None;
        for song in songs {
            let key = song_cache_key(song.id);
            let bytes = serde_json::to_vec(song)?;
            for tier in &self.tiers {
                match tier.add(&key, &bytes, self.expiry) {
                    Ok(()) => {}
                    Err(CacheError::NotStored(_)) => {
                        if evict_on_conflict {
                            debug!("Evicting conflicting {} from {} tier", key, tier.kind());
                            if let Err(e) = tier.delete(&key) {
                                first_err.get_or_insert(e);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Failed to add {} to {} tier: {}", key, tier.kind(), e);
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Removes the song from every tier. All tiers are attempted.
    pub fn evict(&self, id: SongId) -> Result<(), CacheError> {
        let key = song_cache_key(id);
        let mut first_err = None;
        for tier in &self.tiers {
            if let Err(e) = tier.delete(&key) {
                warn!("Failed to evict {} from {} tier: {}", key, tier.kind(), e);
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

    fn song(id: SongId, title: &str) -> Song {
        Song {
            id,
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn setup() -> (Arc<MemoryCacheTier>, Arc<SqliteCacheTier>, RecordCache) {
        let fast = Arc::new(MemoryCacheTier::new(16));
        let durable = Arc::new(SqliteCacheTier::in_memory().unwrap());
        let cache = RecordCache::new(
            vec![fast.clone() as Arc<dyn CacheTier>, durable.clone()],
            None,
        );
        (fast, durable, cache)
    }

    #[test]
    fn test_key_format() {
        assert_eq!(song_cache_key(42), "song-42");
    }

    #[test]
    fn test_put_then_get() {
        let (_, _, cache) = setup();
        cache.put_many(&[song(1, "a"), song(2, "b")], false).unwrap();
        let found = cache.get_many(&[1, 2, 3]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[&1].title, "a");
        assert!(!found.contains_key(&3));
    }

    #[test]
    fn test_get_falls_back_without_repopulating() {
        let (fast, durable, cache) = setup();
        cache.put_many(&[song(1, "a")], false).unwrap();
        fast.flush().unwrap();

        let found = cache.get_many(&[1]);
        assert_eq!(found[&1].title, "a");
        assert!(fast.get("song-1").unwrap().is_none());
        assert!(durable.get("song-1").unwrap().is_some());
    }

    #[test]
    fn test_conflict_keeps_or_evicts() {
        let (fast, durable, cache) = setup();
        cache.put_many(&[song(1, "old")], false).unwrap();

        cache.put_many(&[song(1, "new")], false).unwrap();
        assert_eq!(cache.get_many(&[1])[&1].title, "old");

        cache.put_many(&[song(1, "new")], true).unwrap();
        assert!(fast.get("song-1").unwrap().is_none());
        assert!(durable.get("song-1").unwrap().is_none());
        assert!(cache.get_many(&[1]).is_empty());

        cache.put_many(&[song(1, "new")], true).unwrap();
        assert_eq!(cache.get_many(&[1])[&1].title, "new");
    }

    #[test]
    fn test_evict() {
        let (_, _, cache) = setup();
        cache.put_many(&[song(5, "x")], false).unwrap();
        cache.evict(5).unwrap();
        cache.evict(5).unwrap();
        assert!(cache.get_many(&[5]).is_empty());
    }

    #[test]
    fn test_disabled_cache_is_empty() {
        let cache = RecordCache::disabled();
        cache.put_many(&[song(1, "a")], true).unwrap();
        assert!(cache.get_many(&[1]).is_empty());
        assert!(cache.tiers().is_empty());
    }
}
