use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The two cache layers, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    /// Volatile in-process cache.
    Fast,
    /// Survives restarts and loss of the fast tier.
    Durable,
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheType::Fast => write!(f, "fast"),
            CacheType::Durable => write!(f, "durable"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" | "memory" => Ok(CacheType::Fast),
            "durable" | "sqlite" => Ok(CacheType::Durable),
            other => Err(format!("unknown cache tier '{}'", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// An add-if-absent write found the key already present.
    #[error("Key {0} is already present")]
    NotStored(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache tier unavailable: {0}")]
    Unavailable(String),
}

/// A string-keyed byte cache with optional expiry.
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> CacheType;

    /// Returns `Ok(None)` on a miss.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), CacheError>;

    /// Stores `value` only if `key` is absent, failing with [`CacheError::NotStored`] otherwise.
    fn add(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), CacheError>;

    /// Succeeds if the key is absent.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drops every entry.
    fn flush(&self) -> Result<(), CacheError>;
}

pub fn get_json<T: DeserializeOwned>(tier: &dyn CacheTier, key: &str) -> Result<Option<T>, CacheError> {
    match tier.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Writes `value` under `key`. If the write fails the key is deleted so a
/// stale copy isn't left behind.
pub fn set_json<T: Serialize + ?Sized>(
    tier: &dyn CacheTier,
    key: &str,
    value: &T,
    expiry: Option<Duration>,
) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(value)?;
    if let Err(e) = tier.set(key, &bytes, expiry) {
        if let Err(delete_err) = tier.delete(key) {
            tracing::warn!(
                "Failed to delete stale {} after failed write to {} tier: {}",
                key,
                tier.kind(),
                delete_err
            );
        }
        return Err(e);
    }
    Ok(())
}
