//! Test library lifecycle
//!
//! Each test gets an isolated library with its own database directory.

use song_library::cache::{CacheTier, MemoryCacheTier, SqliteCacheTier};
use song_library::config::{AppConfig, CacheSettings};
use song_library::{Library, LibraryStore, Song, SongId, SongSearcher, SongUpdater, SqliteLibraryStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Library with isolated storage and direct access to its cache tiers.
pub struct TestLibrary {
    pub library: Library,
    pub fast: Arc<MemoryCacheTier>,
    pub durable: Arc<SqliteCacheTier>,
    pub config: AppConfig,

    _temp_dir: TempDir,
}

impl TestLibrary {
    pub fn new() -> Self {
        Self::with_max_results(100)
    }

    pub fn with_max_results(max_results: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = AppConfig {
            db_dir: temp_dir.path().to_path_buf(),
            max_results,
            read_pool_size: 2,
            cache: CacheSettings::default(),
        };
        let store = Arc::new(
            SqliteLibraryStore::new(config.library_db_path(), config.read_pool_size)
                .expect("Failed to open library store"),
        );
        let fast = Arc::new(MemoryCacheTier::new(config.cache.fast_tier_capacity));
        let durable = Arc::new(
            SqliteCacheTier::new(config.cache_db_path()).expect("Failed to open cache tier"),
        );
        let tiers: Vec<Arc<dyn CacheTier>> = vec![fast.clone() as Arc<dyn CacheTier>, durable.clone()];
        let library = Library::with_tiers(store, tiers, &config);

        Self {
            library,
            fast,
            durable,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Builds a library over `store` and `tiers`, sharing this library's config.
    pub fn rewire(&self, store: Arc<dyn LibraryStore>, tiers: Vec<Arc<dyn CacheTier>>) -> Library {
        Library::with_tiers(store, tiers, &self.config)
    }

    pub fn searcher(&self) -> &SongSearcher {
        &self.library.searcher
    }

    pub fn updater(&self) -> &SongUpdater {
        &self.library.updater
    }

    /// Imports `song` with its rating and tags.
    pub fn insert(&self, song: &Song) -> SongId {
        self.updater()
            .update_or_insert_song(song, true)
            .expect("Failed to insert song")
    }
}
