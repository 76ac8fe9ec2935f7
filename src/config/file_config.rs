use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub max_results: Option<usize>,
    pub read_pool_size: Option<usize>,

    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_queries: Option<bool>,
    pub cache_songs: Option<bool>,
    pub cache_tags: Option<bool>,
    /// Entries kept by the in-process tier.
    pub fast_tier_capacity: Option<usize>,
    pub durable_tier: Option<bool>,
    /// Expiry of cached songs. Unset means cached songs never expire.
    pub song_expiry_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
