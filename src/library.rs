//! Wiring of the store, caches, searcher and updater from an [`AppConfig`].

use crate::cache::{CacheTier, MemoryCacheTier, QueryCache, RecordCache, SqliteCacheTier, TagCache};
use crate::config::{AppConfig, CacheSettings};
use crate::library_store::{LibraryStore, SqliteLibraryStore};
use crate::query::{InvalidationTracker, SongSearcher};
use crate::update::SongUpdater;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct Library {
    pub store: Arc<dyn LibraryStore>,
    pub searcher: SongSearcher,
    pub updater: SongUpdater,
}

/// Tiers shared by every enabled cache, fastest first.
fn open_tiers(settings: &CacheSettings, cache_db_path: &Path) -> Result<Vec<Arc<dyn CacheTier>>> {
    let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();
    if !(settings.cache_queries || settings.cache_songs || settings.cache_tags) {
        return Ok(tiers);
    }
    tiers.push(Arc::new(MemoryCacheTier::new(settings.fast_tier_capacity)));
    if settings.durable_tier {
        let durable = SqliteCacheTier::new(cache_db_path)
            .with_context(|| format!("Failed to open cache database at {:?}", cache_db_path))?;
        let purged = durable.purge_expired()?;
        if purged > 0 {
            info!("Purged {} expired cache entries", purged);
        }
        tiers.push(Arc::new(durable));
    }
    Ok(tiers)
}

impl Library {
    pub fn open(config: &AppConfig) -> Result<Self> {
        info!("Opening library database at {:?}...", config.library_db_path());
        let store: Arc<dyn LibraryStore> = Arc::new(SqliteLibraryStore::new(
            config.library_db_path(),
            config.read_pool_size,
        )?);
        let tiers = open_tiers(&config.cache, &config.cache_db_path())?;
        Ok(Self::with_tiers(store, tiers, config))
    }

    /// Builds a library around an existing store, giving each enabled cache
    /// the same `tiers`.
    pub fn with_tiers(
        store: Arc<dyn LibraryStore>,
        tiers: Vec<Arc<dyn CacheTier>>,
        config: &AppConfig,
    ) -> Self {
        let settings = &config.cache;
        let query_cache = Arc::new(if settings.cache_queries {
            QueryCache::new(tiers.clone())
        } else {
            QueryCache::disabled()
        });
        let record_cache = Arc::new(if settings.cache_songs {
            RecordCache::new(tiers.clone(), settings.song_expiry)
        } else {
            RecordCache::disabled()
        });
        let tag_cache = Arc::new(if settings.cache_tags {
            TagCache::new(tiers)
        } else {
            TagCache::disabled()
        });
        info!(
            "Caching queries: {}, songs: {}, tags: {}",
            query_cache.is_enabled(),
            !record_cache.tiers().is_empty(),
            tag_cache.is_enabled()
        );

        let invalidation = Arc::new(InvalidationTracker::new(
            Arc::clone(&query_cache),
            Arc::clone(&tag_cache),
        ));
        let searcher = SongSearcher::new(
            Arc::clone(&store),
            query_cache,
            Arc::clone(&record_cache),
            tag_cache,
            config.max_results,
        );
        let updater = SongUpdater::new(Arc::clone(&store), record_cache, invalidation);

        Self {
            store,
            searcher,
            updater,
        }
    }
}
