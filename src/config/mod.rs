mod file_config;

pub use file_config::{CacheConfig, FileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const DEFAULT_READ_POOL_SIZE: usize = 4;
pub const DEFAULT_FAST_TIER_CAPACITY: usize = 1024;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub max_results: Option<usize>,
    pub no_cache: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub max_results: usize,
    pub read_pool_size: usize,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub cache_queries: bool,
    pub cache_songs: bool,
    pub cache_tags: bool,
    pub fast_tier_capacity: usize,
    pub durable_tier: bool,
    pub song_expiry: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_queries: true,
            cache_songs: true,
            cache_tags: true,
            fast_tier_capacity: DEFAULT_FAST_TIER_CAPACITY,
            durable_tier: true,
            song_expiry: None,
        }
    }
}

impl CacheSettings {
    fn disabled() -> Self {
        Self {
            cache_queries: false,
            cache_songs: false,
            cache_tags: false,
            ..Default::default()
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let max_results = file
            .max_results
            .or(cli.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            bail!("max_results must be positive");
        }
        let read_pool_size = file.read_pool_size.unwrap_or(DEFAULT_READ_POOL_SIZE);

        // --no-cache turns every cache off; a [cache] section can switch
        // individual caches back on.
        let base = if cli.no_cache {
            CacheSettings::disabled()
        } else {
            CacheSettings::default()
        };
        let cache_file = file.cache.unwrap_or_default();
        let cache = CacheSettings {
            cache_queries: cache_file.cache_queries.unwrap_or(base.cache_queries),
            cache_songs: cache_file.cache_songs.unwrap_or(base.cache_songs),
            cache_tags: cache_file.cache_tags.unwrap_or(base.cache_tags),
            fast_tier_capacity: cache_file
                .fast_tier_capacity
                .unwrap_or(base.fast_tier_capacity),
            durable_tier: cache_file.durable_tier.unwrap_or(base.durable_tier),
            song_expiry: cache_file.song_expiry_secs.map(Duration::from_secs),
        };

        Ok(Self {
            db_dir,
            max_results,
            read_pool_size,
            cache,
        })
    }

    pub fn library_db_path(&self) -> PathBuf {
        self.db_dir.join("library.db")
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.db_dir.join("cache.db")
    }
}
