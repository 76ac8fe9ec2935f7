//! In-process LRU cache tier.

use super::tier::{CacheError, CacheTier, CacheType};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// Fast cache tier backed by a bounded LRU map. Least recently used entries
/// are dropped once `capacity` is reached.
pub struct MemoryCacheTier {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCacheTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheTier for MemoryCacheTier {
    fn kind(&self) -> CacheType {
        CacheType::Fast
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), CacheError> {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: expiry.map(|d| Instant::now() + d),
        };
        self.entries.lock().unwrap().put(key.to_string(), entry);
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8], expiry: Option<Duration>) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        if entries.peek(key).is_some_and(|e| !e.is_expired(now)) {
            return Err(CacheError::NotStored(key.to_string()));
        }
        entries.put(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: expiry.map(|d| now + d),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap().pop(key);
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
